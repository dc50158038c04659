use crate::{anonymize::FaceSettings, remote::RemoteSettings};
use common::{Environment, LogLevel};
use inference::InferenceConfig;
use report::PlotStyle;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    pub bind_addr: String,
    pub max_upload_bytes: usize,
    pub otel_endpoint: Option<String>,
    pub log_level: LogLevel,
    pub environment: Environment,
    /// Reject unknown `output_type` values instead of ignoring them
    pub strict_output_type: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            max_upload_bytes: 512 * 1024 * 1024,
            otel_endpoint: None,
            log_level: LogLevel::Info,
            environment: Environment::Development,
            strict_output_type: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSettings {
    /// TrueType font for legend labels; swatches only when unset
    pub font_path: Option<PathBuf>,
    pub max_width: u32,
    pub alpha: f32,
}

impl PlotSettings {
    pub fn style(&self) -> PlotStyle {
        PlotStyle {
            max_width: self.max_width,
            alpha: self.alpha,
        }
    }
}

impl Default for PlotSettings {
    fn default() -> Self {
        let style = PlotStyle::default();
        Self {
            font_path: None,
            max_width: style.max_width,
            alpha: style.alpha,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub models: InferenceConfig,
    pub remote: RemoteSettings,
    pub face: FaceSettings,
    pub plot: PlotSettings,
}

/// Defaults, then `litter.toml` if present, then `LITTER_*` variables.
///
/// Nested keys use `__`, e.g. `LITTER_MODELS__PLD__MODEL_PATH`.
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let config = config::Config::builder()
        .add_source(config::Config::try_from(&Settings::default())?)
        .add_source(config::File::with_name("litter").required(false))
        .add_source(
            config::Environment::with_prefix("LITTER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize::<Settings>()
}
