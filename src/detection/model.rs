use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::DetectorConfig;
use crate::detection::backend::{InferenceBackend, ModelInput, RawOutput};
use crate::detection::decode::DecodeStrategy;
use crate::error::{BackendError, DetectError};

/// A configured detector bound to its weights and backend.
///
/// Load, unload and inference on one model are serialized by a per-model
/// lock. The decode strategy is chosen once, at construction.
pub struct Model<B: InferenceBackend> {
    config: DetectorConfig,
    strategy: Box<dyn DecodeStrategy>,
    weights: PathBuf,
    backend: Arc<B>,
    handle: Arc<Mutex<Option<B::Handle>>>,
}

impl<B: InferenceBackend> std::fmt::Debug for Model<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("title", &self.config.title)
            .field("strategy", &self.strategy.name())
            .field("weights", &self.weights)
            .finish()
    }
}

impl<B: InferenceBackend> Model<B> {
    pub fn new(
        config: DetectorConfig,
        weights: impl Into<PathBuf>,
        backend: Arc<B>,
    ) -> Result<Self, DetectError> {
        config.validate()?;
        let strategy = config.strategy();
        Ok(Self {
            config,
            strategy,
            weights: weights.into(),
            backend,
            handle: Arc::new(Mutex::new(None)),
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn title(&self) -> &str {
        &self.config.title
    }

    pub fn weights(&self) -> &Path {
        &self.weights
    }

    pub fn strategy(&self) -> &dyn DecodeStrategy {
        self.strategy.as_ref()
    }

    pub async fn is_loaded(&self) -> bool {
        self.handle.lock().await.is_some()
    }

    /// Load the weights. A no-op when already loaded.
    pub async fn load(&self) -> Result<(), BackendError> {
        let mut guard = self.handle.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let backend = self.backend.clone();
        let path = self.weights.clone();
        let handle = tokio::task::spawn_blocking(move || backend.load(&path))
            .await
            .map_err(|e| BackendError::Load(e.to_string()))??;
        *guard = Some(handle);

        info!(model = %self.config.title, weights = %self.weights.display(), "model loaded");
        Ok(())
    }

    /// Release the weights. A no-op when not loaded.
    pub async fn unload(&self) -> Result<(), BackendError> {
        let mut guard = self.handle.lock().await;
        if let Some(handle) = guard.take() {
            self.backend.unload(handle);
            info!(model = %self.config.title, "model unloaded");
        }
        Ok(())
    }

    /// Run the backend on a prepared input.
    ///
    /// The call runs in its own task holding the model lock, so it finishes
    /// (and releases backend resources) even if the caller stops waiting.
    pub(crate) async fn infer(&self, input: ModelInput) -> Result<RawOutput, DetectError> {
        let handle = self.handle.clone();
        let backend = self.backend.clone();

        let task = tokio::spawn(async move {
            let guard = handle.lock_owned().await;
            tokio::task::spawn_blocking(move || {
                let loaded = guard.as_ref().ok_or(DetectError::ModelNotLoaded)?;
                debug!(width = input.image.width(), height = input.image.height(), "running inference");
                backend.run(loaded, &input).map_err(DetectError::from)
            })
            .await
            .map_err(|e| DetectError::InferenceFailure(e.to_string()))?
        });

        task.await
            .map_err(|e| DetectError::InferenceFailure(e.to_string()))?
    }
}
