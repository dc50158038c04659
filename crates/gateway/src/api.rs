//! DEEPaaS-shaped HTTP surface of the model.

use crate::{
    PredictError,
    dispatch::PredictOutcome,
    input::Upload,
    predict::{PredictRequest, Predictor},
};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};
use inference::ClassifierBackend;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub const MODEL_NAME: &str = "litter_assessment";

#[derive(Debug, Clone, Serialize)]
pub struct ModelMetadata {
    pub name: String,
    pub author: String,
    #[serde(rename = "author-email")]
    pub author_email: String,
    pub description: String,
    pub license: String,
    pub version: String,
}

impl ModelMetadata {
    /// Metadata taken from the package manifest
    pub fn from_package() -> Self {
        let authors = env!("CARGO_PKG_AUTHORS");
        let (author, author_email) = split_author(authors);
        Self {
            name: MODEL_NAME.to_string(),
            author,
            author_email,
            description: env!("CARGO_PKG_DESCRIPTION").to_string(),
            license: env!("CARGO_PKG_LICENSE").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// `Name <email>` into its two parts
fn split_author(authors: &str) -> (String, String) {
    let first = authors.split(':').next().unwrap_or_default().trim();
    match (first.find('<'), first.rfind('>')) {
        (Some(open), Some(close)) if open < close => (
            first[..open].trim().to_string(),
            first[open + 1..close].trim().to_string(),
        ),
        _ => (first.to_string(), String::new()),
    }
}

pub struct AppState<B: ClassifierBackend> {
    pub predictor: Arc<Predictor<B>>,
    pub metadata: ModelMetadata,
}

pub fn router<B: ClassifierBackend + 'static>(
    state: Arc<AppState<B>>,
    max_upload_bytes: usize,
) -> Router {
    Router::new()
        .route("/v2/models/", get(list_models::<B>))
        .route(
            &format!("/v2/models/{MODEL_NAME}/"),
            get(get_metadata::<B>),
        )
        .route(
            &format!("/v2/models/{MODEL_NAME}/predict/"),
            get(get_predict_args).post(predict::<B>),
        )
        .route(&format!("/v2/models/{MODEL_NAME}/train/"), get(get_train_args))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn list_models<B: ClassifierBackend + 'static>(
    State(state): State<Arc<AppState<B>>>,
) -> Json<Value> {
    Json(json!({ "models": [state.metadata] }))
}

async fn get_metadata<B: ClassifierBackend + 'static>(
    State(state): State<Arc<AppState<B>>>,
) -> Json<ModelMetadata> {
    tracing::debug!(model = MODEL_NAME, "Collecting metadata");
    Json(state.metadata.clone())
}

/// Argument schema of the predict operation
pub fn predict_args() -> Value {
    json!({
        "files": {
            "type": "file",
            "location": "form",
            "required": true,
            "description": "Image or zip archive of images to analyse"
        },
        "face_detection": {
            "type": "boolean",
            "location": "form",
            "required": false,
            "default": false,
            "description": "Blur faces before analysis"
        },
        "PLD_plot": {
            "type": "boolean",
            "location": "form",
            "required": false,
            "default": true,
            "description": "Plot litter detection results"
        },
        "PLQ_plot": {
            "type": "boolean",
            "location": "form",
            "required": false,
            "default": true,
            "description": "Plot litter quantification results"
        },
        "output_type": {
            "type": "string",
            "location": "form",
            "required": false,
            "default": "Download",
            "enum": ["Download", "nextcloud"],
            "description": "Return results in the response or copy them to remote storage"
        }
    })
}

async fn get_predict_args() -> Json<Value> {
    Json(predict_args())
}

async fn get_train_args() -> Json<Value> {
    Json(json!({}))
}

/// Form booleans as sent by browsers and command line clients
pub fn parse_flag(name: &str, value: &str) -> Result<bool, PredictError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(PredictError::BadRequest(format!(
            "{name} expects a boolean, got {other:?}"
        ))),
    }
}

async fn predict<B: ClassifierBackend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    mut multipart: Multipart,
) -> Result<Response, PredictError> {
    let mut payload: Option<(NamedTempFile, Upload)> = None;
    let mut face_detection = false;
    let mut pld_plot = true;
    let mut plq_plot = true;
    let mut output_type = "Download".to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PredictError::BadRequest(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "files" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| PredictError::BadRequest(format!("Failed to read upload: {e}")))?;

                let file = tempfile::Builder::new().prefix("litter-upload-").tempfile()?;
                std::fs::write(file.path(), &data)?;
                let upload = Upload::new(filename, content_type, file.path());
                payload = Some((file, upload));
            }
            "face_detection" | "PLD_plot" | "PLQ_plot" | "output_type" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| PredictError::BadRequest(format!("Failed to read {name}: {e}")))?;
                match name.as_str() {
                    "face_detection" => face_detection = parse_flag(&name, &value)?,
                    "PLD_plot" => pld_plot = parse_flag(&name, &value)?,
                    "PLQ_plot" => plq_plot = parse_flag(&name, &value)?,
                    _ => output_type = value,
                }
            }
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    let (file, upload) =
        payload.ok_or_else(|| PredictError::BadRequest("No files field in request".to_string()))?;
    tracing::info!(
        filename = %upload.original_filename,
        content_type = %upload.content_type,
        "Predict request received"
    );

    let request = PredictRequest {
        upload,
        face_detection,
        pld_plot,
        plq_plot,
        output_type,
    };

    let predictor = Arc::clone(&state.predictor);
    let outcome = tokio::task::spawn_blocking(move || {
        // The stored upload must outlive the request
        let _file = file;
        predictor.predict(&request)
    })
    .await
    .map_err(|e| PredictError::Task(e.to_string()))
    .and_then(|result| result);

    match outcome {
        Ok(outcome) => Ok(outcome_response(outcome)),
        Err(e) => {
            tracing::error!(error = %e, "Prediction failed");
            Err(e)
        }
    }
}

fn outcome_response(outcome: PredictOutcome) -> Response {
    match outcome {
        PredictOutcome::Download {
            filename,
            content_type,
            bytes,
        } => (
            [
                (header::CONTENT_TYPE, content_type),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{filename}\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        PredictOutcome::Uploaded { remote, files } => {
            Json(json!({ "remote": remote, "files": files })).into_response()
        }
        PredictOutcome::Nothing => {
            Json(json!({ "message": "no output type selected" })).into_response()
        }
    }
}
