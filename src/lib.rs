pub mod config;
pub mod detection;
pub mod error;
pub mod export;
pub mod models;
pub mod render;
pub mod session;
pub mod view;

pub use config::{DetectorConfig, DetectorFamily};
pub use detection::{
    DecodeStrategy, DetectionPipeline, InferenceBackend, Model, ModelInput, NonMaxSuppressor,
    RawOutput, RecordedBackend, SuppressionMode,
};
pub use error::{BackendError, DetectError, SessionError, ViewError};
pub use models::{Candidate, Detection, InputSize, Point, Rect};
pub use session::{ModelSlot, ViewingSession};
pub use view::{CoordinateFrameStack, Selection, ViewTransform};
