use crate::PredictError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSettings {
    pub rclone_bin: PathBuf,
    pub remote_path: String,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            rclone_bin: PathBuf::from("rclone"),
            remote_path: "rshare:iMagine_UC1/results".to_string(),
        }
    }
}

/// Copies result files to remote storage
pub trait RemoteSync: Send + Sync {
    fn copy(&self, local: &Path, remote: &str) -> Result<(), PredictError>;
}

/// Runs `rclone copy <local> <remote>` and waits for it
pub struct RcloneSync {
    binary: PathBuf,
}

impl RcloneSync {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl RemoteSync for RcloneSync {
    fn copy(&self, local: &Path, remote: &str) -> Result<(), PredictError> {
        tracing::info!(local = %local.display(), remote, "Copying to remote storage");

        let output = Command::new(&self.binary)
            .arg("copy")
            .arg(local)
            .arg(remote)
            .output()?;

        if !output.status.success() {
            return Err(PredictError::RemoteCopy {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_successful_copy() {
        let sync = RcloneSync::new("true");
        assert!(sync.copy(Path::new("/tmp/a.jpg"), "remote:dir").is_ok());
    }

    #[test]
    fn test_failed_copy_reports_status() {
        let sync = RcloneSync::new("false");
        let err = sync.copy(Path::new("/tmp/a.jpg"), "remote:dir").unwrap_err();
        assert!(matches!(err, PredictError::RemoteCopy { .. }));
    }

    #[test]
    fn test_missing_binary_is_io_error() {
        let sync = RcloneSync::new("/nonexistent/rclone");
        let err = sync.copy(Path::new("/tmp/a.jpg"), "remote:dir").unwrap_err();
        assert!(matches!(err, PredictError::Io(_)));
    }
}
