pub mod anonymize;
pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod input;
pub mod predict;
pub mod remote;

pub use anonymize::{FaceAnonymizer, FaceSettings, RustfaceAnonymizer};
pub use dispatch::{OutputMode, PlotMode, PredictOutcome};
pub use error::PredictError;
pub use input::{ResolvedInput, Upload, resolve};
pub use predict::{PredictRequest, PredictSettings, Predictor};
pub use remote::{RcloneSync, RemoteSettings, RemoteSync};

use inference::{ClassifierBackend, ModelProvider};
use report::ResultPlot;
use std::sync::Arc;

/// Wire a [`Predictor`] from loaded settings.
///
/// Models are not loaded here; call [`ModelProvider::warm`] on
/// [`Predictor::provider`] when they should be ready before the first request.
pub fn build_predictor<B: ClassifierBackend>(
    settings: &config::Settings,
) -> anyhow::Result<Predictor<B>> {
    let provider = Arc::new(ModelProvider::<B>::new(settings.models.clone())?);

    let mut plotter = ResultPlot::new(settings.plot.style());
    if let Some(font_path) = &settings.plot.font_path {
        plotter = plotter.with_font_file(font_path)?;
    }

    let remote: Arc<dyn RemoteSync> = Arc::new(RcloneSync::new(&settings.remote.rclone_bin));
    let mut predictor = Predictor::new(
        provider,
        remote,
        plotter,
        PredictSettings {
            remote_path: settings.remote.remote_path.clone(),
            strict_output_type: settings.server.strict_output_type,
        },
    );

    if let Some(model_path) = &settings.face.model_path {
        let anonymizer = RustfaceAnonymizer::from_file(model_path, &settings.face)?;
        predictor = predictor.with_anonymizer(Arc::new(anonymizer));
    }

    Ok(predictor)
}
