use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use inference::InferenceError;
use report::ReportError;
use serde_json::json;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid zip archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("archive {0} contains no images")]
    EmptyInput(String),

    #[error("failed to decode image {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: image::ImageError,
    },

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("no output type selected: {0:?} is neither `Download` nor `nextcloud`")]
    NoOutputSelected(String),

    #[error("no plot requested: enable PLD_plot, PLQ_plot or both")]
    NoPlotRequested,

    #[error("face anonymization unavailable: {0}")]
    Anonymizer(String),

    #[error("rclone copy failed ({status}): {stderr}")]
    RemoteCopy { status: String, stderr: String },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("prediction task failed: {0}")]
    Task(String),
}

impl PredictError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PredictError::BadRequest(_)
            | PredictError::Archive(_)
            | PredictError::EmptyInput(_)
            | PredictError::Decode { .. }
            | PredictError::NoOutputSelected(_)
            | PredictError::NoPlotRequested
            | PredictError::Inference(InferenceError::ImageTooSmall { .. }) => {
                StatusCode::BAD_REQUEST
            }
            PredictError::Inference(InferenceError::ModelLoad { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
