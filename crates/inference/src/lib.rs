pub mod backend;
pub mod config;
pub mod error;
pub mod labels;
pub mod postprocessing;
pub mod provider;
pub mod stages;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

// Re-export commonly used types for convenience
pub use backend::{BackendOptions, ClassifierBackend, ExecutionProvider};
pub use config::{InferenceConfig, StageConfig};
pub use error::InferenceError;
pub use labels::LabelSet;
pub use provider::{LoadedModels, ModelProvider};
pub use stages::{Classifier, DetectionResult, QuantificationResult, QuantifiedItem, TilePrediction};
