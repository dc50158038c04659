use crate::backend::ExecutionProvider;
use crate::labels::{PLD_LABELS, PLD_LITTER_CLASSES, PLQ_LABELS};
use preprocess::{ChannelLayout, Normalization};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings for one classification stage (PLD or PLQ)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    pub model_path: PathBuf,
    /// Edge length in pixels of the square region classified at once
    pub tile_size: u32,
    pub input_width: u32,
    pub input_height: u32,
    pub layout: ChannelLayout,
    pub normalization: Normalization,
    /// Apply softmax to the model output (set when the model emits logits)
    pub apply_softmax: bool,
    /// Maximum number of tiles per model call
    pub batch_size: usize,
    pub labels: Vec<String>,
}

impl StageConfig {
    pub fn pld_default() -> Self {
        Self {
            model_path: PathBuf::from("models/PLD_CNN.onnx"),
            tile_size: 256,
            input_width: 224,
            input_height: 224,
            layout: ChannelLayout::Nhwc,
            normalization: Normalization::UnitRange,
            apply_softmax: false,
            batch_size: 32,
            labels: PLD_LABELS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn plq_default() -> Self {
        Self {
            model_path: PathBuf::from("models/PLQ_CNN.onnx"),
            tile_size: 64,
            input_width: 64,
            input_height: 64,
            layout: ChannelLayout::Nhwc,
            normalization: Normalization::UnitRange,
            apply_softmax: false,
            batch_size: 128,
            labels: PLQ_LABELS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn input_size(&self) -> (u32, u32) {
        (self.input_width, self.input_height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub execution_provider: ExecutionProvider,
    pub intra_threads: usize,
    pub pld: StageConfig,
    pub plq: StageConfig,
    /// Detection classes whose tiles are handed to quantification
    pub litter_classes: Vec<usize>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            execution_provider: ExecutionProvider::Cpu,
            intra_threads: 4,
            pld: StageConfig::pld_default(),
            plq: StageConfig::plq_default(),
            litter_classes: PLD_LITTER_CLASSES.to_vec(),
        }
    }
}

impl InferenceConfig {
    /// Reject settings that would make the pipeline fail on every request
    pub fn validate(&self) -> Result<(), String> {
        for (name, stage) in [("pld", &self.pld), ("plq", &self.plq)] {
            if stage.tile_size == 0 {
                return Err(format!("{name}.tile_size must be > 0"));
            }
            if stage.input_width == 0 || stage.input_height == 0 {
                return Err(format!("{name} input size must be > 0"));
            }
            if stage.batch_size == 0 {
                return Err(format!("{name}.batch_size must be > 0"));
            }
            if stage.labels.is_empty() {
                return Err(format!("{name}.labels must not be empty"));
            }
        }

        if self.plq.tile_size > self.pld.tile_size {
            return Err(format!(
                "plq.tile_size ({}) must not exceed pld.tile_size ({})",
                self.plq.tile_size, self.pld.tile_size
            ));
        }

        if let Some(class) = self
            .litter_classes
            .iter()
            .find(|&&c| c >= self.pld.labels.len())
        {
            return Err(format!(
                "litter class {} is outside the {} detection labels",
                class,
                self.pld.labels.len()
            ));
        }

        Ok(())
    }

    /// Point both stages at different model files, keeping every other default
    pub fn with_model_paths(mut self, pld: impl Into<PathBuf>, plq: impl Into<PathBuf>) -> Self {
        self.pld.model_path = pld.into();
        self.plq.model_path = plq.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(InferenceConfig::default().validate(), Ok(()));
    }

    #[test]
    fn quantification_tile_must_fit_detection_tile() {
        let mut config = InferenceConfig::default();
        config.plq.tile_size = 512;
        let err = config.validate().unwrap_err();
        assert!(err.contains("plq.tile_size"), "got: {err}");
    }

    #[test]
    fn litter_class_must_exist() {
        let mut config = InferenceConfig::default();
        config.litter_classes = vec![0, 42];
        let err = config.validate().unwrap_err();
        assert!(err.contains("42"), "got: {err}");
    }

    #[test]
    fn with_model_paths_keeps_other_settings() {
        let config = InferenceConfig::default().with_model_paths("/m/a.onnx", "/m/b.onnx");
        assert_eq!(config.pld.model_path, PathBuf::from("/m/a.onnx"));
        assert_eq!(config.plq.model_path, PathBuf::from("/m/b.onnx"));
        assert_eq!(config.pld.tile_size, 256);
    }
}
