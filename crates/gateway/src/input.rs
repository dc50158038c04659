//! Turns an uploaded payload into the list of images to analyse.

use crate::PredictError;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const ZIP_CONTENT_TYPES: [&str; 2] = ["application/zip", "application/x-zip-compressed"];

/// A stored upload as received from the client
#[derive(Debug, Clone)]
pub struct Upload {
    pub original_filename: String,
    pub content_type: String,
    pub path: PathBuf,
}

impl Upload {
    pub fn new(
        original_filename: impl Into<String>,
        content_type: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            original_filename: original_filename.into(),
            content_type: content_type.into(),
            path: path.into(),
        }
    }

    pub fn is_archive(&self) -> bool {
        let content_type = self.content_type.to_ascii_lowercase();
        if ZIP_CONTENT_TYPES.contains(&content_type.as_str()) {
            return true;
        }

        content_type == "application/octet-stream"
            && self.original_filename.to_ascii_lowercase().ends_with(".zip")
    }
}

/// Image names with the paths holding their bytes.
///
/// Owns the scratch directories the paths point into; they are removed when
/// this value is dropped.
#[derive(Debug)]
pub struct ResolvedInput {
    names: Vec<String>,
    paths: Vec<PathBuf>,
    scratch: Vec<TempDir>,
}

impl ResolvedInput {
    /// Images already on disk; nothing is cleaned up on drop
    pub fn new(names: Vec<String>, paths: Vec<PathBuf>) -> Self {
        debug_assert_eq!(names.len(), paths.len());
        Self {
            names,
            paths,
            scratch: Vec::new(),
        }
    }

    pub fn single(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            names: vec![name.into()],
            paths: vec![path.into()],
            scratch: Vec::new(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.paths.iter().map(PathBuf::as_path))
    }

    /// Swap every path for a rewritten copy stored in `scratch`
    pub(crate) fn replace_paths(&mut self, paths: Vec<PathBuf>, scratch: TempDir) {
        debug_assert_eq!(paths.len(), self.paths.len());
        self.paths = paths;
        self.scratch.push(scratch);
    }
}

/// Resolve `upload` into images.
///
/// Archives are extracted into a fresh scratch directory and every top-level
/// regular file is taken as an image, in directory listing order. Hidden
/// entries and directories are skipped.
pub fn resolve(upload: &Upload) -> Result<ResolvedInput, PredictError> {
    if !upload.is_archive() {
        return Ok(ResolvedInput::single(
            upload.original_filename.clone(),
            upload.path.clone(),
        ));
    }

    let scratch = tempfile::Builder::new().prefix("litter-input-").tempdir()?;
    let mut archive = zip::ZipArchive::new(File::open(&upload.path)?)?;
    archive.extract(scratch.path())?;

    let mut names = Vec::new();
    let mut paths = Vec::new();
    for entry in fs::read_dir(scratch.path())? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }

        paths.push(entry.path());
        names.push(name);
    }

    if names.is_empty() {
        return Err(PredictError::EmptyInput(upload.original_filename.clone()));
    }

    tracing::debug!(
        archive = %upload.original_filename,
        images = names.len(),
        "Archive extracted"
    );

    Ok(ResolvedInput {
        names,
        paths,
        scratch: vec![scratch],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, SimpleFileOptions::default()).unwrap();
            } else {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(data).unwrap();
            }
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_plain_upload_is_a_single_image() {
        let upload = Upload::new("beach.jpg", "image/jpeg", "/tmp/upload-123");
        let input = resolve(&upload).unwrap();

        assert_eq!(input.names(), ["beach.jpg"]);
        assert_eq!(input.paths(), [PathBuf::from("/tmp/upload-123")]);
    }

    #[test]
    fn test_archive_detection() {
        assert!(Upload::new("a.zip", "application/zip", "x").is_archive());
        assert!(Upload::new("a.zip", "application/x-zip-compressed", "x").is_archive());
        assert!(Upload::new("a.ZIP", "application/octet-stream", "x").is_archive());
        assert!(!Upload::new("a.jpg", "application/octet-stream", "x").is_archive());
        assert!(!Upload::new("a.zip", "image/jpeg", "x").is_archive());
    }

    #[test]
    fn test_archive_lists_top_level_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("batch.zip");
        write_zip(
            &zip_path,
            &[
                ("one.jpg", b"1"),
                ("two.jpg", b"2"),
                (".DS_Store", b"x"),
                ("__MACOSX/", b""),
                ("__MACOSX/._one.jpg", b"x"),
            ],
        );

        let input = resolve(&Upload::new("batch.zip", "application/zip", &zip_path)).unwrap();

        let mut names = input.names().to_vec();
        names.sort();
        assert_eq!(names, ["one.jpg", "two.jpg"]);
        assert!(input.paths().iter().all(|p| p.exists()));
    }

    #[test]
    fn test_scratch_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("batch.zip");
        write_zip(&zip_path, &[("one.jpg", b"1")]);

        let input = resolve(&Upload::new("batch.zip", "application/zip", &zip_path)).unwrap();
        let extracted = input.paths()[0].clone();
        assert!(extracted.exists());

        drop(input);
        assert!(!extracted.exists());
    }

    #[test]
    fn test_empty_archive_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("empty.zip");
        write_zip(&zip_path, &[("nested/", b"")]);

        let err = resolve(&Upload::new("empty.zip", "application/zip", &zip_path)).unwrap_err();
        assert!(matches!(err, PredictError::EmptyInput(_)));
    }

    #[test]
    fn test_malformed_archive_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("broken.zip");
        fs::write(&zip_path, b"not a zip").unwrap();

        let err = resolve(&Upload::new("broken.zip", "application/zip", &zip_path)).unwrap_err();
        assert!(matches!(err, PredictError::Archive(_)));
    }
}
