use crate::{
    backend::{BackendOptions, ClassifierBackend},
    config::{InferenceConfig, StageConfig},
    error::InferenceError,
    stages::{self, Classifier, DetectionResult, QuantificationResult},
};
use image::RgbImage;
use once_cell::sync::OnceCell;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

/// Both classifiers, loaded and ready
pub struct LoadedModels<B: ClassifierBackend> {
    pub pld: Classifier<B>,
    pub plq: Classifier<B>,
    litter_classes: Vec<usize>,
}

impl<B: ClassifierBackend> LoadedModels<B> {
    pub fn load(config: &InferenceConfig) -> Result<Self, InferenceError> {
        let options = BackendOptions {
            execution_provider: config.execution_provider,
            intra_threads: config.intra_threads,
        };

        let pld = load_stage::<B>("PLD", &config.pld, &options)?;
        let plq = load_stage::<B>("PLQ", &config.plq, &options)?;

        Ok(Self::from_backends(pld, plq, config))
    }

    pub fn from_backends(pld: B, plq: B, config: &InferenceConfig) -> Self {
        Self {
            pld: Classifier::new(pld, &config.pld),
            plq: Classifier::new(plq, &config.plq),
            litter_classes: config.litter_classes.clone(),
        }
    }

    pub fn detect(&mut self, image: &RgbImage) -> Result<DetectionResult, InferenceError> {
        stages::detect(&mut self.pld, image)
    }

    pub fn quantify(
        &mut self,
        detection: &DetectionResult,
        image: &RgbImage,
    ) -> Result<QuantificationResult, InferenceError> {
        stages::quantify(&mut self.plq, detection, image, &self.litter_classes)
    }
}

fn load_stage<B: ClassifierBackend>(
    name: &str,
    config: &StageConfig,
    options: &BackendOptions,
) -> Result<B, InferenceError> {
    let start = Instant::now();
    tracing::info!(model = name, path = %config.model_path.display(), "Loading model");

    let backend = B::load_model(&config.model_path, options).map_err(|source| {
        InferenceError::ModelLoad {
            path: config.model_path.clone(),
            source,
        }
    })?;

    tracing::info!(
        model = name,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Model loaded successfully"
    );
    Ok(backend)
}

/// Owns the detection and quantification models for the whole process.
///
/// Models are loaded on the first call to [`ModelProvider::warm`] or
/// [`ModelProvider::models`] and kept afterwards. Concurrent first calls
/// block on a single load. A failed load leaves the provider empty so the
/// next call tries again.
pub struct ModelProvider<B: ClassifierBackend> {
    config: InferenceConfig,
    models: OnceCell<Mutex<LoadedModels<B>>>,
}

impl<B: ClassifierBackend> ModelProvider<B> {
    pub fn new(config: InferenceConfig) -> Result<Self, InferenceError> {
        config.validate().map_err(InferenceError::InvalidConfig)?;
        Ok(Self {
            config,
            models: OnceCell::new(),
        })
    }

    /// Provider around models that are already loaded
    pub fn preloaded(config: InferenceConfig, models: LoadedModels<B>) -> Self {
        Self {
            config,
            models: OnceCell::with_value(Mutex::new(models)),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.models.get().is_some()
    }

    /// Load both models ahead of the first request
    pub fn warm(&self) -> Result<(), InferenceError> {
        self.cell().map(|_| ())
    }

    /// Exclusive access to the loaded models, loading them if needed
    pub fn models(&self) -> Result<MutexGuard<'_, LoadedModels<B>>, InferenceError> {
        self.cell()?.lock().map_err(|_| InferenceError::Poisoned)
    }

    fn cell(&self) -> Result<&Mutex<LoadedModels<B>>, InferenceError> {
        self.models
            .get_or_try_init(|| LoadedModels::load(&self.config).map(Mutex::new))
    }
}
