//! Contract with the inference runtime that executes a model.

use std::path::Path;

use image::RgbImage;
use ndarray::{Array4, ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::models::InputSize;

/// Resized zone crop handed to the backend
#[derive(Debug, Clone)]
pub struct ModelInput {
    pub image: RgbImage,
    /// Multiplier for 0-255 pixel values when tensorising
    pub pixel_scale: f32,
}

impl ModelInput {
    pub fn size(&self) -> InputSize {
        InputSize::new(self.image.width(), self.image.height())
    }

    /// `[1, height, width, 3]` tensor with scaled pixel values
    pub fn to_nhwc_tensor(&self) -> Array4<f32> {
        let (w, h) = self.image.dimensions();
        Array4::from_shape_fn((1, h as usize, w as usize, 3), |(_, y, x, ch)| {
            self.image.get_pixel(x as u32, y as u32)[ch] as f32 * self.pixel_scale
        })
    }
}

/// One or more numeric arrays produced by a model run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawOutput {
    pub tensors: Vec<ArrayD<f32>>,
}

impl RawOutput {
    pub fn new(tensors: Vec<ArrayD<f32>>) -> Self {
        Self { tensors }
    }
}

/// Executes models. Implementations are shared between models and threads;
/// per-model serialization is handled by [`crate::detection::Model`].
pub trait InferenceBackend: Send + Sync + 'static {
    type Handle: Send + 'static;

    fn load(&self, path: &Path) -> Result<Self::Handle, BackendError>;

    fn unload(&self, handle: Self::Handle);

    fn run(&self, handle: &Self::Handle, input: &ModelInput) -> Result<RawOutput, BackendError>;
}

/// JSON form of a raw output: `{"tensors": [{"shape": [..], "data": [..]}]}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedOutput {
    pub tensors: Vec<RecordedTensor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedTensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl TryFrom<RecordedOutput> for RawOutput {
    type Error = BackendError;

    fn try_from(recorded: RecordedOutput) -> Result<Self, Self::Error> {
        recorded
            .tensors
            .into_iter()
            .map(|t| {
                ArrayD::from_shape_vec(IxDyn(&t.shape), t.data)
                    .map_err(|e| BackendError::Load(format!("tensor {:?}: {}", t.shape, e)))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(RawOutput::new)
    }
}

impl From<&RawOutput> for RecordedOutput {
    fn from(raw: &RawOutput) -> Self {
        Self {
            tensors: raw
                .tensors
                .iter()
                .map(|t| RecordedTensor {
                    shape: t.shape().to_vec(),
                    data: t.iter().copied().collect(),
                })
                .collect(),
        }
    }
}

/// Replays a raw output recorded to JSON, whatever the input. Useful for
/// checking decode settings against a known model dump.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordedBackend;

impl InferenceBackend for RecordedBackend {
    type Handle = RawOutput;

    fn load(&self, path: &Path) -> Result<RawOutput, BackendError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| BackendError::Load(format!("{}: {}", path.display(), e)))?;
        let recorded: RecordedOutput = serde_json::from_str(&text)
            .map_err(|e| BackendError::Load(format!("{}: {}", path.display(), e)))?;
        RawOutput::try_from(recorded)
    }

    fn unload(&self, _handle: RawOutput) {}

    fn run(&self, handle: &RawOutput, _input: &ModelInput) -> Result<RawOutput, BackendError> {
        Ok(handle.clone())
    }
}

#[cfg(feature = "rten")]
pub use rten_backend::RtenBackend;

#[cfg(feature = "rten")]
mod rten_backend {
    use std::path::Path;

    use ndarray::{ArrayD, IxDyn};
    use rten::Model;
    use rten_tensor::Tensor;
    use rten_tensor::prelude::*;

    use super::{InferenceBackend, ModelInput, RawOutput};
    use crate::error::BackendError;

    /// Runs `.rten` models with an NHWC image input
    #[derive(Debug, Clone, Copy, Default)]
    pub struct RtenBackend;

    impl InferenceBackend for RtenBackend {
        type Handle = Model;

        fn load(&self, path: &Path) -> Result<Model, BackendError> {
            Model::load_file(path).map_err(|e| BackendError::Load(e.to_string()))
        }

        fn unload(&self, handle: Model) {
            drop(handle);
        }

        fn run(&self, model: &Model, input: &ModelInput) -> Result<RawOutput, BackendError> {
            let tensor = input.to_nhwc_tensor();
            let shape = tensor.shape().to_vec();
            let (data, _) = tensor.into_raw_vec_and_offset();
            let input_tensor = Tensor::from_data(&shape, data);

            let input_id = *model
                .input_ids()
                .first()
                .ok_or_else(|| BackendError::Run("model has no inputs".to_string()))?;
            let outputs = model
                .run(
                    vec![(input_id, rten::Value::from(input_tensor).into())],
                    model.output_ids(),
                    None,
                )
                .map_err(|e| BackendError::Run(e.to_string()))?;

            outputs
                .into_iter()
                .map(|value| {
                    let t: Tensor<f32> = value
                        .try_into()
                        .map_err(|e| BackendError::Run(format!("{e:?}")))?;
                    ArrayD::from_shape_vec(IxDyn(t.shape()), t.to_vec())
                        .map_err(|e| BackendError::Run(e.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(RawOutput::new)
        }
    }
}
