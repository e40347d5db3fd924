#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from zonedetect for tests
pub use zonedetect::{
    Candidate, DetectError, Detection, DetectionPipeline, DetectorConfig, InputSize, Model,
    NonMaxSuppressor, Point, RawOutput, Rect, SuppressionMode, ViewError,
};
