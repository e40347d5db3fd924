use thiserror::Error;

/// Failures surfaced by a detection request.
#[derive(Error, Debug)]
pub enum DetectError {
    #[error("invalid region: {width}x{height} has no area")]
    InvalidRegion { width: f64, height: f64 },

    #[error("inference failed: {0}")]
    InferenceFailure(String),

    #[error("raw output does not match detector: {0}")]
    DecodeError(String),

    #[error("model is not loaded")]
    ModelNotLoaded,

    #[error("invalid detector configuration: {0}")]
    InvalidConfig(String),
}

impl From<BackendError> for DetectError {
    fn from(err: BackendError) -> Self {
        DetectError::InferenceFailure(err.to_string())
    }
}

/// Errors reported by an inference backend.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to load model: {0}")]
    Load(String),

    #[error("failed to run model: {0}")]
    Run(String),
}

/// Misuse of the coordinate frame stack.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewError {
    #[error("no image loaded")]
    NoImage,

    #[error("no selection in progress")]
    NoSelection,

    #[error("view scale {0} is outside (0, 1]")]
    InvalidScale(f64),

    #[error("image has no pixels: {width}x{height}")]
    EmptyImage { width: u32, height: u32 },
}

/// Errors from driving a viewing session.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no detection zone selected")]
    NoZone,

    #[error("no model selected")]
    NoModel,

    #[error(transparent)]
    View(#[from] ViewError),

    #[error(transparent)]
    Detect(#[from] DetectError),
}
