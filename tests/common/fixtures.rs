use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use image::{DynamicImage, ImageBuffer, Rgb};
use ndarray::{ArrayD, IxDyn};
use tempfile::NamedTempFile;
use zonedetect::detection::backend::RecordedOutput;
use zonedetect::{
    BackendError, DetectorConfig, InferenceBackend, InputSize, Model, ModelInput, RawOutput,
};

/// Backend returning a fixed raw output and counting every call, including
/// how many calls were ever inside the backend at once
#[derive(Debug, Default)]
pub struct FakeBackend {
    pub output: RawOutput,
    pub delay: Option<Duration>,
    pub fail_runs: bool,
    pub loads: AtomicUsize,
    pub unloads: AtomicUsize,
    pub runs: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub last_input: Mutex<Option<InputSize>>,
}

impl FakeBackend {
    pub fn returning(output: RawOutput) -> Self {
        Self {
            output,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing() -> Self {
        Self {
            fail_runs: true,
            ..Self::default()
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn unloads(&self) -> usize {
        self.unloads.load(Ordering::SeqCst)
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn last_input(&self) -> Option<InputSize> {
        *self.last_input.lock().unwrap()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn pause(&self) {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
    }
}

impl InferenceBackend for FakeBackend {
    type Handle = ();

    fn load(&self, _path: &Path) -> Result<(), BackendError> {
        self.enter();
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.exit();
        Ok(())
    }

    fn unload(&self, _handle: ()) {
        self.enter();
        self.unloads.fetch_add(1, Ordering::SeqCst);
        self.pause();
        self.exit();
    }

    fn run(&self, _handle: &(), input: &ModelInput) -> Result<RawOutput, BackendError> {
        self.enter();
        self.runs.fetch_add(1, Ordering::SeqCst);
        *self.last_input.lock().unwrap() = Some(input.size());
        self.pause();
        self.exit();
        if self.fail_runs {
            return Err(BackendError::Run("backend exploded".to_string()));
        }
        Ok(self.output.clone())
    }
}

/// Build a model around a fake backend, returning both so tests can inspect
/// the call counters.
pub fn fake_model(
    config: DetectorConfig,
    backend: FakeBackend,
) -> (Model<FakeBackend>, Arc<FakeBackend>) {
    let backend = Arc::new(backend);
    let model = Model::new(config, "fake.weights", backend.clone()).expect("valid config");
    (model, backend)
}

/// Solid gray RGB image
pub fn test_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |_, _| {
        Rgb([128u8, 128u8, 128u8])
    }))
}

pub fn tensor(shape: &[usize], data: Vec<f32>) -> ArrayD<f32> {
    ArrayD::from_shape_vec(IxDyn(shape), data).expect("shape matches data")
}

/// Direct-regression output with `(top, left, bottom, right)` boxes and raw
/// (offset) class indices
pub fn ssd_output(boxes: &[[f32; 4]], scores: &[f32], classes: &[f32], count: usize) -> RawOutput {
    RawOutput::new(vec![
        tensor(&[1, boxes.len(), 4], boxes.iter().flatten().copied().collect()),
        tensor(&[1, scores.len()], scores.to_vec()),
        tensor(&[1, classes.len()], classes.to_vec()),
        tensor(&[1], vec![count as f32]),
    ])
}

/// SSD preset with a fixed input size so back-mapping scales are non-trivial
pub fn ssd_config_with_input(width: u32, height: u32) -> DetectorConfig {
    DetectorConfig {
        input_size: Some(InputSize::new(width, height)),
        ..DetectorConfig::ssd_coco()
    }
}

/// Serialize a raw output to a temporary `.json` file
pub fn write_recorded_output(raw: &RawOutput) -> NamedTempFile {
    let file = tempfile::Builder::new()
        .suffix(".json")
        .tempfile()
        .expect("Failed to create temp output file");
    let recorded = RecordedOutput::from(raw);
    serde_json::to_writer(file.as_file(), &recorded).expect("Failed to write recorded output");
    file
}
