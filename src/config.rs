use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::detection::decode::{
    DecodeStrategy, DirectRegressionDecoder, GridAnchorDecoder, MultiScaleGridDecoder,
};
use crate::detection::nms::{NonMaxSuppressor, SuppressionMode};
use crate::error::DetectError;
use crate::models::InputSize;

/// Label offset applied to direct-regression class indices (backend ids start
/// past the background slot)
pub const DEFAULT_CLASS_OFFSET: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorFamily {
    DirectRegression,
    GridAnchorSingle,
    GridAnchorMulti,
}

/// Per-model detector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    #[serde(default)]
    pub title: String,
    pub family: DetectorFamily,
    #[serde(default)]
    pub input_size: Option<InputSize>,
    /// One anchor list per detection head, each anchor a `[width, height]` pair
    #[serde(default)]
    pub anchors: Vec<Vec<[f32; 2]>>,
    pub class_count: usize,
    pub prob_threshold: f32,
    pub iou_threshold: f32,
    #[serde(default)]
    pub class_names: Vec<String>,
    #[serde(default)]
    pub suppression: SuppressionMode,
    #[serde(default = "default_class_offset")]
    pub class_offset: i64,
    /// Multiplier applied to 0-255 pixel values when building the input tensor
    #[serde(default)]
    pub input_scale: Option<f32>,
}

fn default_class_offset() -> i64 {
    DEFAULT_CLASS_OFFSET
}

impl DetectorConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: DetectorConfig = serde_json::from_str(&text)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.as_ref().display(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DetectError> {
        let invalid = |msg: String| Err(DetectError::InvalidConfig(msg));

        if !(0.0..=1.0).contains(&self.prob_threshold) {
            return invalid(format!("prob_threshold {} outside [0, 1]", self.prob_threshold));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return invalid(format!("iou_threshold {} outside [0, 1]", self.iou_threshold));
        }
        if self.class_count == 0 {
            return invalid("class_count must be positive".to_string());
        }
        if !self.class_names.is_empty() && self.class_names.len() != self.class_count {
            return invalid(format!(
                "{} class names for {} classes",
                self.class_names.len(),
                self.class_count
            ));
        }
        if let Some(size) = self.input_size {
            if size.width == 0 || size.height == 0 {
                return invalid(format!("input size {}x{} is empty", size.width, size.height));
            }
        }

        let heads = match self.family {
            DetectorFamily::DirectRegression => return Ok(()),
            DetectorFamily::GridAnchorSingle => 1,
            DetectorFamily::GridAnchorMulti => 2,
        };
        if self.input_size.is_none() {
            return invalid("grid-anchor detectors need a fixed input_size".to_string());
        }
        if self.anchors.len() != heads {
            return invalid(format!(
                "expected {} anchor list(s), got {}",
                heads,
                self.anchors.len()
            ));
        }
        if self.anchors.iter().any(|list| list.is_empty()) {
            return invalid("anchor lists must not be empty".to_string());
        }
        Ok(())
    }

    /// Pick the decode strategy for this detector family
    pub fn strategy(&self) -> Box<dyn DecodeStrategy> {
        match self.family {
            DetectorFamily::DirectRegression => Box::new(DirectRegressionDecoder {
                class_offset: self.class_offset,
                class_count: self.class_count,
            }),
            DetectorFamily::GridAnchorSingle => Box::new(GridAnchorDecoder {
                anchors: self.anchors.first().cloned().unwrap_or_default(),
                class_count: self.class_count,
            }),
            DetectorFamily::GridAnchorMulti => Box::new(MultiScaleGridDecoder {
                heads: self.anchors.clone(),
                class_count: self.class_count,
            }),
        }
    }

    pub fn suppressor(&self) -> NonMaxSuppressor {
        NonMaxSuppressor {
            iou_threshold: self.iou_threshold,
            prob_threshold: self.prob_threshold,
            mode: self.suppression,
        }
    }

    pub fn pixel_scale(&self) -> f32 {
        self.input_scale.unwrap_or(match self.family {
            DetectorFamily::DirectRegression => 1.0,
            _ => 1.0 / 255.0,
        })
    }

    pub fn class_name(&self, class_id: usize) -> Option<&str> {
        self.class_names.get(class_id).map(String::as_str)
    }

    /// Tiny YOLOv2 trained on COCO
    pub fn yolo2_coco() -> Self {
        Self {
            title: "Yolo-Coco".to_string(),
            family: DetectorFamily::GridAnchorSingle,
            input_size: Some(InputSize::new(416, 416)),
            anchors: vec![vec![
                [0.57273, 0.677385],
                [1.87446, 2.06253],
                [3.33843, 5.47434],
                [7.88282, 3.52778],
                [9.77052, 9.16828],
            ]],
            class_count: COCO_CLASSES.len(),
            prob_threshold: 0.4,
            iou_threshold: 0.4,
            class_names: coco_names(),
            suppression: SuppressionMode::CrossClass,
            class_offset: DEFAULT_CLASS_OFFSET,
            input_scale: None,
        }
    }

    /// Two-head YOLOv3 tiny with a single "F18" class
    pub fn yolo3_f18() -> Self {
        Self {
            title: "Yolo-F18".to_string(),
            family: DetectorFamily::GridAnchorMulti,
            input_size: Some(InputSize::new(416, 416)),
            anchors: vec![
                vec![[81.0, 82.0], [135.0, 169.0], [344.0, 319.0]],
                vec![[10.0, 14.0], [23.0, 27.0], [37.0, 58.0]],
            ],
            class_count: 1,
            prob_threshold: 0.6,
            iou_threshold: 0.5,
            class_names: vec!["F18".to_string()],
            suppression: SuppressionMode::CrossClass,
            class_offset: DEFAULT_CLASS_OFFSET,
            input_scale: None,
        }
    }

    /// SSD with backend-side box regression, run at the crop's own size
    pub fn ssd_coco() -> Self {
        Self {
            title: "Ssd-Coco".to_string(),
            family: DetectorFamily::DirectRegression,
            input_size: None,
            anchors: Vec::new(),
            class_count: COCO_CLASSES.len(),
            prob_threshold: 0.6,
            iou_threshold: 0.7,
            class_names: coco_names(),
            suppression: SuppressionMode::CrossClass,
            class_offset: DEFAULT_CLASS_OFFSET,
            input_scale: None,
        }
    }
}

fn coco_names() -> Vec<String> {
    COCO_CLASSES.iter().map(|s| s.to_string()).collect()
}

pub const COCO_CLASSES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorbike",
    "aeroplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "sofa",
    "pottedplant",
    "bed",
    "diningtable",
    "toilet",
    "tvmonitor",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];
