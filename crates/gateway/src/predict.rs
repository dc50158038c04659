use crate::{
    PredictError,
    anonymize::{FaceAnonymizer, anonymize_images},
    dispatch::{Dispatcher, ImageArtifacts, OutputMode, PlotMode, PredictOutcome, Step},
    input::{Upload, resolve},
    remote::RemoteSync,
};
use common::span;
use image::{ImageReader, RgbImage};
use inference::{ClassifierBackend, ModelProvider};
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use report::{
    DETECTION_SHEET, PlotKind, QUANTIFICATION_SHEET, ResultPlot, detection_table,
    quantification_table, write_workbook,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// One call of the predict operation
#[derive(Debug, Clone)]
pub struct PredictRequest {
    pub upload: Upload,
    pub face_detection: bool,
    pub pld_plot: bool,
    pub plq_plot: bool,
    pub output_type: String,
}

impl PredictRequest {
    /// Request with the default arguments: both plots, no face detection, download
    pub fn new(upload: Upload) -> Self {
        Self {
            upload,
            face_detection: false,
            pld_plot: true,
            plq_plot: true,
            output_type: "Download".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PredictSettings {
    pub remote_path: String,
    pub strict_output_type: bool,
}

struct PredictMetrics {
    requests: Counter<u64>,
    images: Counter<u64>,
    duration: Histogram<f64>,
}

impl PredictMetrics {
    fn new() -> Self {
        let meter = global::meter("gateway");
        Self {
            requests: meter
                .u64_counter("predict_requests_total")
                .with_description("Predict requests handled, by outcome")
                .build(),
            images: meter
                .u64_counter("predict_images_total")
                .with_description("Images run through detection")
                .build(),
            duration: meter
                .f64_histogram("predict_duration_seconds")
                .with_description("Time to answer one predict request")
                .with_unit("s")
                .with_boundaries(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0])
                .build(),
        }
    }
}

/// Drives a request from upload to outcome
pub struct Predictor<B: ClassifierBackend> {
    provider: Arc<ModelProvider<B>>,
    anonymizer: Option<Arc<dyn FaceAnonymizer>>,
    remote: Arc<dyn RemoteSync>,
    plotter: ResultPlot,
    settings: PredictSettings,
    metrics: PredictMetrics,
}

impl<B: ClassifierBackend> Predictor<B> {
    pub fn new(
        provider: Arc<ModelProvider<B>>,
        remote: Arc<dyn RemoteSync>,
        plotter: ResultPlot,
        settings: PredictSettings,
    ) -> Self {
        Self {
            provider,
            anonymizer: None,
            remote,
            plotter,
            settings,
            metrics: PredictMetrics::new(),
        }
    }

    pub fn with_anonymizer(mut self, anonymizer: Arc<dyn FaceAnonymizer>) -> Self {
        self.anonymizer = Some(anonymizer);
        self
    }

    pub fn provider(&self) -> &ModelProvider<B> {
        &self.provider
    }

    pub fn predict(&self, request: &PredictRequest) -> Result<PredictOutcome, PredictError> {
        let start = Instant::now();
        let result = self.run(request);

        let outcome = match &result {
            Ok(PredictOutcome::Download { .. }) => "download",
            Ok(PredictOutcome::Uploaded { .. }) => "uploaded",
            Ok(PredictOutcome::Nothing) => "nothing",
            Err(_) => "error",
        };
        self.metrics
            .requests
            .add(1, &[KeyValue::new("outcome", outcome)]);
        self.metrics
            .duration
            .record(start.elapsed().as_secs_f64(), &[]);

        result
    }

    fn run(&self, request: &PredictRequest) -> Result<PredictOutcome, PredictError> {
        let _predict_span = span!("predict");

        let plot_mode = PlotMode::from_flags(request.pld_plot, request.plq_plot);
        if plot_mode == PlotMode::Neither {
            return Err(PredictError::NoPlotRequested);
        }
        let output = OutputMode::parse(&request.output_type, self.settings.strict_output_type)?;

        let mut input = resolve(&request.upload)?;
        if request.face_detection {
            let anonymizer = self.anonymizer.as_deref().ok_or_else(|| {
                PredictError::Anonymizer("no face detection model configured".to_string())
            })?;
            input = anonymize_images(anonymizer, input)?;
        }

        let scratch = tempfile::Builder::new().prefix("litter-results-").tempdir()?;
        let dispatcher = Dispatcher::new(self.remote.as_ref(), &self.settings.remote_path);
        let mut uploaded = Vec::new();

        tracing::info!(
            images = input.len(),
            plot_mode = ?plot_mode,
            output = ?output,
            "Processing upload"
        );

        for (name, path) in input.iter() {
            let artifacts = self.process_image(name, path, plot_mode, scratch.path())?;

            match dispatcher.dispatch(plot_mode, output, scratch.path(), &artifacts)? {
                // Only the first image of a download request is answered
                Step::Finished(outcome) => return Ok(outcome),
                Step::Uploaded(files) => uploaded.extend(files),
                Step::Kept => {}
            }
        }

        match output {
            Some(OutputMode::Nextcloud) => Ok(PredictOutcome::Uploaded {
                remote: self.settings.remote_path.clone(),
                files: uploaded,
            }),
            _ => Ok(PredictOutcome::Nothing),
        }
    }

    /// Classify one image and write the files its plot mode asks for
    fn process_image(
        &self,
        name: &str,
        path: &Path,
        plot_mode: PlotMode,
        scratch: &Path,
    ) -> Result<ImageArtifacts, PredictError> {
        let stem = image_stem(name);
        let output_path = scratch.join(&stem).to_string_lossy().into_owned();
        let image = load_image(name, path)?;

        let (detection, quantification) = {
            let _inference_span = span!("inference");
            let mut models = self.provider.models()?;
            let detection = models.detect(&image)?;
            let quantification = if plot_mode.needs_quantification() {
                Some(models.quantify(&detection, &image)?)
            } else {
                None
            };
            (detection, quantification)
        };
        self.metrics.images.add(1, &[]);

        tracing::debug!(
            image = name,
            tiles = detection.grid.len(),
            litter_items = quantification.as_ref().map(|q| q.items.len()),
            "Image classified"
        );

        let _report_span = span!("report");
        let mut artifacts = ImageArtifacts {
            stem: stem.clone(),
            ..ImageArtifacts::default()
        };

        if matches!(plot_mode, PlotMode::Both | PlotMode::DetectionOnly) {
            let plot = self.plotter.render_detection(&image, &detection);
            let plot_path = PlotKind::Pld.file_name(&output_path);
            self.plotter.save(&plot, Path::new(&plot_path))?;
            artifacts.pld_plot = Some(plot_path.into());
        }

        if let Some(quantification) = &quantification {
            let plot = self.plotter.render_quantification(&image, quantification);
            let plot_path = PlotKind::Plq.file_name(&output_path);
            self.plotter.save(&plot, Path::new(&plot_path))?;
            artifacts.plq_plot = Some(plot_path.into());

            if plot_mode == PlotMode::Both {
                let workbook_path = scratch.join(format!("{stem}_litter_items.xlsx"));
                write_workbook(
                    &workbook_path,
                    &[
                        (DETECTION_SHEET, &detection_table(&detection)),
                        (QUANTIFICATION_SHEET, &quantification_table(quantification)),
                    ],
                )?;
                artifacts.workbook = Some(workbook_path);
            }
        }

        Ok(artifacts)
    }
}

/// File name without directories or extension
pub(crate) fn image_stem(name: &str) -> String {
    let path = Path::new(name);
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}

/// Decode the image at `path`, guessing the format from its content
pub(crate) fn load_image(name: &str, path: &Path) -> Result<RgbImage, PredictError> {
    let decode = |source| PredictError::Decode {
        name: name.to_string(),
        source,
    };

    let image = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(decode)?;
    Ok(image.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_stem() {
        assert_eq!(image_stem("beach.jpg"), "beach");
        assert_eq!(image_stem("dir/beach.final.png"), "beach.final");
        assert_eq!(image_stem("noext"), "noext");
        assert_eq!(image_stem(""), "image");
    }

    #[test]
    fn test_undecodable_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload");
        std::fs::write(&path, b"definitely not an image").unwrap();

        let err = load_image("beach.jpg", &path).unwrap_err();
        assert!(matches!(err, PredictError::Decode { name, .. } if name == "beach.jpg"));
    }
}
