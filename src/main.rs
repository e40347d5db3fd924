use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use image::ImageReader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use zonedetect::detection::InferenceBackend;
use zonedetect::render::{ImageSurface, render_detections};
use zonedetect::{
    Detection, DetectionPipeline, DetectorConfig, Model, ModelSlot, RecordedBackend, Rect,
    ViewingSession,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Preset {
    Yolo2Coco,
    Yolo3F18,
    SsdCoco,
}

#[derive(Parser)]
#[command(name = "zonedetect")]
#[command(about = "Detect objects inside a selected zone of an image")]
struct Cli {
    /// Path to input image file
    #[arg(value_name = "IMAGE")]
    image_path: PathBuf,

    /// Built-in detector configuration
    #[arg(long, value_enum, default_value = "yolo2-coco", conflicts_with = "config")]
    preset: Preset,

    /// Detector configuration JSON file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Model weights (`.json` files replay a recorded raw output)
    #[arg(long, value_name = "PATH")]
    weights: PathBuf,

    /// Zone in image pixels as LEFT,TOP,WIDTH,HEIGHT (default: whole image)
    #[arg(long, value_name = "L,T,W,H", value_parser = parse_zone)]
    zone: Option<Rect>,

    /// Write detections as CSV
    #[arg(long, value_name = "FILE")]
    csv: Option<PathBuf>,

    /// Save the image with the zone and detections drawn
    #[arg(long, value_name = "FILE")]
    overlay: Option<PathBuf>,

    /// Print detections as JSON
    #[arg(long)]
    json: bool,

    /// Give up on inference after this many milliseconds
    #[arg(long, value_name = "N")]
    timeout_ms: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn parse_zone(s: &str) -> Result<Rect, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid number in zone: {}", e))?;
    match parts.as_slice() {
        [left, top, width, height] => Ok(Rect::new(*left, *top, *width, *height)),
        _ => Err(format!("expected 4 values, got {}", parts.len())),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => DetectorConfig::from_json_file(path)?,
        None => match args.preset {
            Preset::Yolo2Coco => DetectorConfig::yolo2_coco(),
            Preset::Yolo3F18 => DetectorConfig::yolo3_f18(),
            Preset::SsdCoco => DetectorConfig::ssd_coco(),
        },
    };

    let is_recorded = args
        .weights
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_recorded {
        return run(&args, config, RecordedBackend).await;
    }
    run_native(&args, config).await
}

#[cfg(feature = "rten")]
async fn run_native(args: &Cli, config: DetectorConfig) -> anyhow::Result<()> {
    run(args, config, zonedetect::detection::RtenBackend).await
}

#[cfg(not(feature = "rten"))]
async fn run_native(args: &Cli, _config: DetectorConfig) -> anyhow::Result<()> {
    anyhow::bail!(
        "{}: only recorded .json outputs are supported without the `rten` feature",
        args.weights.display()
    )
}

async fn run<B: InferenceBackend>(args: &Cli, config: DetectorConfig, backend: B) -> anyhow::Result<()> {
    let img = ImageReader::open(&args.image_path)?
        .decode()
        .map_err(|e| anyhow::anyhow!("Failed to decode image: {}", e))?;
    info!(path = %args.image_path.display(), width = img.width(), height = img.height(), "image loaded");

    let mut session = ViewingSession::default();
    session.load_image(img)?;
    let zone = args.zone.unwrap_or_else(|| {
        let (w, h) = session
            .image()
            .map(|i| (i.width() as f64, i.height() as f64))
            .unwrap_or_default();
        Rect::new(0.0, 0.0, w, h)
    });
    session.set_zone(zone);

    let class_names = config.class_names.clone();
    let model = Arc::new(Model::new(config, args.weights.clone(), Arc::new(backend))?);
    let mut slot = ModelSlot::new();
    slot.select(model.clone()).await?;

    let mut pipeline = DetectionPipeline::new();
    if let Some(ms) = args.timeout_ms {
        pipeline = pipeline.with_timeout(Duration::from_millis(ms));
    }
    let result = session.detect(&pipeline, &*model).await.map(|d| d.to_vec());
    slot.release().await?;
    let detections = result?;

    print_detections(&detections, &class_names, args.json)?;

    if let Some(path) = &args.csv {
        zonedetect::export::save_csv(path, &detections, &class_names)?;
        info!(path = %path.display(), "CSV written");
    }
    if let Some(path) = &args.overlay {
        save_overlay(&session, &class_names, path)?;
    }
    Ok(())
}

fn print_detections(detections: &[Detection], class_names: &[String], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(detections)?);
        return Ok(());
    }

    println!("\n=== Detection Results ===");
    println!("Total detections: {}", detections.len());
    if detections.is_empty() {
        println!("No objects detected.");
        return Ok(());
    }
    for d in detections {
        let label = class_names
            .get(d.class_id)
            .cloned()
            .unwrap_or_else(|| d.class_id.to_string());
        println!(
            "  {} at ({:.1}, {:.1}) size {:.1}x{:.1} - score: {:.2}",
            label, d.bbox.left, d.bbox.top, d.bbox.width, d.bbox.height, d.score
        );
    }
    Ok(())
}

/// Draw in image pixels: the overlay file is the full-resolution image, not
/// the fitted view.
fn save_overlay(session: &ViewingSession, class_names: &[String], path: &Path) -> anyhow::Result<()> {
    let Some(img) = session.image() else {
        warn!("no image to draw on");
        return Ok(());
    };

    let groups = session.visible_overlay_in_image();

    let mut surface = ImageSurface::new(img.to_rgba8());
    let zone = session.zone();
    render_detections(&mut surface, zone.as_ref(), &groups, |class_id, score| {
        let name = class_names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| class_id.to_string());
        format!("{} {:.2}", name, score)
    });
    surface
        .into_image()
        .save(path)
        .map_err(|e| anyhow::anyhow!("Failed to save overlay: {}", e))?;
    info!(path = %path.display(), "overlay saved");
    Ok(())
}
