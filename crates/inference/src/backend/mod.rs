use ndarray::{Array2, ArrayView4};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[cfg(feature = "ort-backend")]
pub mod ort;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    #[default]
    Cpu,
    Cuda,
}

/// Session settings shared by every model the provider loads
#[derive(Debug, Clone, Copy)]
pub struct BackendOptions {
    pub execution_provider: ExecutionProvider,
    pub intra_threads: usize,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            execution_provider: ExecutionProvider::Cpu,
            intra_threads: 4,
        }
    }
}

/// An image classifier mapping a batch of tiles to per-class scores.
pub trait ClassifierBackend: Send {
    fn load_model(path: &Path, options: &BackendOptions) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Run inference on a `[N, ...]` batch and return `[N, num_classes]` scores
    fn classify(&mut self, batch: ArrayView4<'_, f32>) -> anyhow::Result<Array2<f32>>;
}
