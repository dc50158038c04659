#![allow(dead_code)]

use gateway::{
    FaceAnonymizer, PredictError, PredictSettings, Predictor, RemoteSync, config::Settings,
};
use image::RgbImage;
use inference::{
    InferenceConfig, ModelProvider,
    testing::{ColorRuleBackend, quadrant_image, write_model_file},
};
use report::{PlotStyle, ResultPlot};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

pub const IMAGE_SIZE: u32 = 128;

/// Small tiles so test images stay tiny
pub fn test_settings(dir: &Path) -> Settings {
    let pld = dir.join("pld.model");
    let plq = dir.join("plq.model");
    write_model_file(&pld, 8).unwrap();
    write_model_file(&plq, 5).unwrap();

    let mut models = InferenceConfig::default().with_model_paths(pld, plq);
    models.pld.tile_size = 64;
    models.pld.input_width = 16;
    models.pld.input_height = 16;
    models.plq.tile_size = 32;
    models.plq.input_width = 16;
    models.plq.input_height = 16;

    let mut settings = Settings::default();
    settings.models = models;
    settings.remote.remote_path = "test:results".to_string();
    settings
}

pub fn predictor(settings: &Settings, remote: Arc<dyn RemoteSync>) -> Predictor<ColorRuleBackend> {
    let provider = Arc::new(ModelProvider::new(settings.models.clone()).unwrap());
    Predictor::new(
        provider,
        remote,
        ResultPlot::new(PlotStyle::default()),
        PredictSettings {
            remote_path: settings.remote.remote_path.clone(),
            strict_output_type: settings.server.strict_output_type,
        },
    )
}

pub fn save_image(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    quadrant_image(IMAGE_SIZE).save(&path).unwrap();
    path
}

pub fn image_bytes() -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = save_image(dir.path(), "image.png");
    std::fs::read(path).unwrap()
}

pub fn write_zip(path: &Path, names: &[&str]) {
    let image = image_bytes();
    let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
    for name in names {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(&image).unwrap();
    }
    writer.finish().unwrap();
}

/// Names of the entries of an in-memory zip archive
pub fn zip_entries(bytes: &[u8]) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    let mut names = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let mut content = Vec::new();
        file.read_to_end(&mut content).unwrap();
        assert!(!content.is_empty(), "{} is empty", file.name());
        names.push(file.name().to_string());
    }
    names.sort();
    names
}

/// Remote that records every copy and checks the file is there
#[derive(Default)]
pub struct RecordingRemote {
    pub copies: Mutex<Vec<(PathBuf, String)>>,
    pub fail: bool,
}

impl RemoteSync for RecordingRemote {
    fn copy(&self, local: &Path, remote: &str) -> Result<(), PredictError> {
        assert!(local.exists(), "{} missing at copy time", local.display());
        if self.fail {
            return Err(PredictError::RemoteCopy {
                status: "exit status: 1".into(),
                stderr: "remote not found".into(),
            });
        }
        self.copies
            .lock()
            .unwrap()
            .push((local.to_path_buf(), remote.to_string()));
        Ok(())
    }
}

/// Counts the images it sees without changing them
#[derive(Default)]
pub struct CountingAnonymizer {
    pub seen: AtomicUsize,
}

impl FaceAnonymizer for CountingAnonymizer {
    fn anonymize(&self, _image: &mut RgbImage) -> usize {
        self.seen.fetch_add(1, Ordering::SeqCst);
        0
    }
}
