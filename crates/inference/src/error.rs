use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("failed to load model {}: {source}", path.display())]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("image {width}x{height} is smaller than one {tile_size}px tile")]
    ImageTooSmall {
        width: u32,
        height: u32,
        tile_size: u32,
    },

    #[error("model output shape mismatch: expected {expected}, got {got}")]
    OutputShape { expected: String, got: String },

    #[error("invalid inference configuration: {0}")]
    InvalidConfig(String),

    #[error("model lock poisoned by a panicking request")]
    Poisoned,

    #[error("inference failed: {0}")]
    Runtime(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_formatting() {
        let err = InferenceError::ImageTooSmall {
            width: 100,
            height: 80,
            tile_size: 256,
        };
        assert_eq!(
            err.to_string(),
            "image 100x80 is smaller than one 256px tile"
        );

        let err = InferenceError::ModelLoad {
            path: PathBuf::from("models/PLD_CNN.onnx"),
            source: anyhow::anyhow!("file not found"),
        };
        assert_eq!(
            err.to_string(),
            "failed to load model models/PLD_CNN.onnx: file not found"
        );
    }

    #[test]
    fn test_anyhow_converts_with_question_mark() {
        fn fails() -> anyhow::Result<()> {
            anyhow::bail!("session run failed")
        }

        fn uses_question_mark() -> Result<(), InferenceError> {
            fails()?;
            Ok(())
        }

        match uses_question_mark().unwrap_err() {
            InferenceError::Runtime(e) => assert_eq!(e.to_string(), "session run failed"),
            other => panic!("Expected Runtime variant, got {other:?}"),
        }
    }
}
