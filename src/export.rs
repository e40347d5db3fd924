use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::models::Detection;

pub const CSV_HEADER: &str = "label,score,left,top,width,height";

/// Write detections as CSV, one row per detection. Unknown class ids are
/// written as their number.
pub fn write_csv<W: Write>(
    mut writer: W,
    detections: &[Detection],
    class_names: &[String],
) -> std::io::Result<()> {
    writeln!(writer, "{}", CSV_HEADER)?;
    for d in detections {
        let label = class_names
            .get(d.class_id)
            .cloned()
            .unwrap_or_else(|| d.class_id.to_string());
        writeln!(
            writer,
            "{},{:.2},{},{},{},{}",
            csv_field(&label),
            d.score,
            d.bbox.left,
            d.bbox.top,
            d.bbox.width,
            d.bbox.height
        )?;
    }
    writer.flush()
}

pub fn to_csv_string(detections: &[Detection], class_names: &[String]) -> std::io::Result<String> {
    let mut buf = Vec::new();
    write_csv(&mut buf, detections, class_names)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

pub fn save_csv<P: AsRef<Path>>(
    path: P,
    detections: &[Detection],
    class_names: &[String],
) -> anyhow::Result<()> {
    let file = File::create(path.as_ref())
        .map_err(|e| anyhow::anyhow!("Failed to create {}: {}", path.as_ref().display(), e))?;
    write_csv(BufWriter::new(file), detections, class_names)?;
    Ok(())
}

/// Quote labels containing separators or quotes
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
