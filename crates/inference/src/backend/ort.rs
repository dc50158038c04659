use super::{BackendOptions, ClassifierBackend, ExecutionProvider};
use ndarray::{Array2, ArrayView4, Ix2};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use std::path::Path;

pub struct OrtBackend {
    session: Session,
}

impl OrtBackend {
    /// Load model with specified execution provider
    pub fn load_model_with_options(path: &Path, options: &BackendOptions) -> anyhow::Result<Self> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        #[allow(unused_mut)]
        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(options.intra_threads)?;

        match options.execution_provider {
            #[cfg(feature = "cuda")]
            ExecutionProvider::Cuda => {
                tracing::info!("Initializing ONNX Runtime with CUDA execution provider");
                builder = builder.with_execution_providers([
                    ort::execution_providers::CUDAExecutionProvider::default()
                        .with_device_id(0)
                        .build()
                        .error_on_failure(),
                ])?;
            }
            #[cfg(not(feature = "cuda"))]
            ExecutionProvider::Cuda => {
                tracing::warn!("Built without the `cuda` feature, falling back to CPU");
            }
            ExecutionProvider::Cpu => {
                tracing::info!("Initializing ONNX Runtime with CPU execution provider");
            }
        }

        let session = builder.commit_from_file(path)?;

        tracing::info!(path = %path.display(), "Model loaded");
        Ok(Self { session })
    }
}

impl ClassifierBackend for OrtBackend {
    fn load_model(path: &Path, options: &BackendOptions) -> anyhow::Result<Self> {
        Self::load_model_with_options(path, options)
    }

    fn classify(&mut self, batch: ArrayView4<'_, f32>) -> anyhow::Result<Array2<f32>> {
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(batch)?])?;

        let scores = outputs[0].try_extract_array::<f32>()?;
        let scores = scores
            .into_dimensionality::<Ix2>()
            .map_err(|e| anyhow::anyhow!("classifier output is not [batch, classes]: {e}"))?;

        Ok(scores.to_owned())
    }
}
