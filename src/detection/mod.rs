pub mod backend;
pub mod decode;
pub mod model;
pub mod nms;
pub mod preprocessing;

pub use backend::{InferenceBackend, ModelInput, RawOutput, RecordedBackend};
#[cfg(feature = "rten")]
pub use backend::RtenBackend;
pub use decode::DecodeStrategy;
pub use model::Model;
pub use nms::{NonMaxSuppressor, SuppressionMode};

use std::time::Duration;

use image::DynamicImage;
use image::imageops::FilterType;
use tracing::{debug, info};

use crate::error::DetectError;
use crate::models::{Candidate, Detection, InputSize, Rect};

/// Zone-restricted detection: crop, resize, infer, decode, suppress and map
/// back to image pixels.
#[derive(Debug, Clone)]
pub struct DetectionPipeline {
    /// Upper bound on a single backend call
    pub timeout: Option<Duration>,
    pub resize_filter: FilterType,
}

impl DetectionPipeline {
    pub fn new() -> Self {
        Self {
            timeout: None,
            resize_filter: FilterType::Triangle,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.resize_filter = filter;
        self
    }

    /// Detect objects inside `zone` (image pixels) using `model`.
    ///
    /// The zone is clipped to the image first; a zone without area is
    /// rejected before the backend is touched. Detections come back in
    /// descending score order, in image pixels, inside the zone.
    pub async fn detect<B: InferenceBackend>(
        &self,
        image: &DynamicImage,
        zone: &Rect,
        model: &Model<B>,
    ) -> Result<Vec<Detection>, DetectError> {
        let zone = preprocessing::clip_zone(zone, image)?;
        if !model.is_loaded().await {
            return Err(DetectError::ModelNotLoaded);
        }

        let crop = preprocessing::crop_zone(image, &zone)?;
        let input_size = model
            .config()
            .input_size
            .unwrap_or_else(|| InputSize::new(crop.width(), crop.height()));
        let input = ModelInput {
            image: preprocessing::resize_to(&crop, input_size, self.resize_filter),
            pixel_scale: model.config().pixel_scale(),
        };
        debug!(
            model = %model.title(),
            zone = ?zone,
            width = input_size.width,
            height = input_size.height,
            "prepared model input"
        );

        let raw = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, model.infer(input))
                .await
                .map_err(|_| {
                    DetectError::InferenceFailure(format!(
                        "no result within {} ms",
                        limit.as_millis()
                    ))
                })??,
            None => model.infer(input).await?,
        };

        let candidates = model.strategy().decode(&raw, input_size)?;
        debug!(
            strategy = model.strategy().name(),
            candidates = candidates.len(),
            "decoded raw output"
        );
        let kept = model.config().suppressor().suppress(candidates);
        let detections = map_to_image(kept, &zone, input_size);

        if detections.is_empty() {
            info!(model = %model.title(), "no objects detected in zone");
        } else {
            info!(model = %model.title(), count = detections.len(), "detection complete");
        }
        Ok(detections)
    }
}

impl Default for DetectionPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Map boxes from model-input pixels back into original-image pixels,
/// clipped to the zone. Order is preserved.
pub fn map_to_image(candidates: Vec<Candidate>, zone: &Rect, input: InputSize) -> Vec<Detection> {
    let sy = zone.height / input.height as f64;
    let sx = zone.width / input.width as f64;
    candidates
        .into_iter()
        .map(|c| Detection {
            bbox: c
                .bbox
                .scale_vec(sy, sx)
                .clamp_to(zone.width, zone.height)
                .translate(zone.top_left()),
            class_id: c.class_id,
            score: c.score,
        })
        .collect()
}
