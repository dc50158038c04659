//! Decides what happens to the files written for one image.
//!
//! | plot mode           | Download                 | nextcloud              | unselected |
//! |---------------------|--------------------------|------------------------|------------|
//! | both                | zip of the scratch dir   | upload both plots      | keep       |
//! | detection only      | PLD plot bytes           | upload PLD plot        | keep       |
//! | quantification only | PLQ plot bytes           | upload PLQ plot        | keep       |
//! | neither             | error                    | error                  | error      |

use crate::{PredictError, remote::RemoteSync};
use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotMode {
    Both,
    DetectionOnly,
    QuantificationOnly,
    Neither,
}

impl PlotMode {
    pub fn from_flags(pld_plot: bool, plq_plot: bool) -> Self {
        match (pld_plot, plq_plot) {
            (true, true) => PlotMode::Both,
            (true, false) => PlotMode::DetectionOnly,
            (false, true) => PlotMode::QuantificationOnly,
            (false, false) => PlotMode::Neither,
        }
    }

    pub fn needs_quantification(&self) -> bool {
        matches!(self, PlotMode::Both | PlotMode::QuantificationOnly)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Download,
    Nextcloud,
}

impl OutputMode {
    /// Parse an `output_type` argument.
    ///
    /// Unknown values are an error when `strict`, otherwise `None`.
    pub fn parse(value: &str, strict: bool) -> Result<Option<Self>, PredictError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "download" => Ok(Some(OutputMode::Download)),
            "nextcloud" => Ok(Some(OutputMode::Nextcloud)),
            _ if strict => Err(PredictError::NoOutputSelected(value.to_string())),
            _ => Ok(None),
        }
    }
}

/// What a prediction request hands back to its caller
#[derive(Debug, Clone, PartialEq)]
pub enum PredictOutcome {
    Download {
        filename: String,
        content_type: String,
        bytes: Vec<u8>,
    },
    Uploaded {
        remote: String,
        files: Vec<String>,
    },
    Nothing,
}

/// Files written for one image
#[derive(Debug, Clone, Default)]
pub struct ImageArtifacts {
    pub stem: String,
    pub workbook: Option<PathBuf>,
    pub pld_plot: Option<PathBuf>,
    pub plq_plot: Option<PathBuf>,
}

#[derive(Debug, PartialEq)]
pub enum Step {
    /// Stop processing and answer with this outcome
    Finished(PredictOutcome),
    /// Remote names of the files uploaded for this image
    Uploaded(Vec<String>),
    /// Nothing left the scratch directory
    Kept,
}

pub struct Dispatcher<'a> {
    remote: &'a dyn RemoteSync,
    remote_path: &'a str,
}

impl<'a> Dispatcher<'a> {
    pub fn new(remote: &'a dyn RemoteSync, remote_path: &'a str) -> Self {
        Self {
            remote,
            remote_path,
        }
    }

    pub fn dispatch(
        &self,
        plot_mode: PlotMode,
        output: Option<OutputMode>,
        scratch: &Path,
        artifacts: &ImageArtifacts,
    ) -> Result<Step, PredictError> {
        let plots: Vec<&Path> = match plot_mode {
            PlotMode::Neither => return Err(PredictError::NoPlotRequested),
            PlotMode::Both => vec![
                required(&artifacts.pld_plot, "PLD plot")?,
                required(&artifacts.plq_plot, "PLQ plot")?,
            ],
            PlotMode::DetectionOnly => vec![required(&artifacts.pld_plot, "PLD plot")?],
            PlotMode::QuantificationOnly => vec![required(&artifacts.plq_plot, "PLQ plot")?],
        };

        match output {
            None => {
                tracing::warn!(image = %artifacts.stem, "No output type selected");
                Ok(Step::Kept)
            }
            Some(OutputMode::Download) if plot_mode == PlotMode::Both => {
                Ok(Step::Finished(PredictOutcome::Download {
                    filename: format!("{}_results.zip", artifacts.stem),
                    content_type: "application/zip".to_string(),
                    bytes: zip_directory(scratch)?,
                }))
            }
            Some(OutputMode::Download) => {
                let plot = plots[0];
                Ok(Step::Finished(PredictOutcome::Download {
                    filename: file_name(plot),
                    content_type: "image/jpeg".to_string(),
                    bytes: fs::read(plot)?,
                }))
            }
            Some(OutputMode::Nextcloud) => {
                let mut uploaded = Vec::with_capacity(plots.len());
                for plot in plots {
                    self.remote.copy(plot, self.remote_path)?;
                    uploaded.push(format!(
                        "{}/{}",
                        self.remote_path.trim_end_matches('/'),
                        file_name(plot)
                    ));
                }
                Ok(Step::Uploaded(uploaded))
            }
        }
    }
}

fn required<'p>(path: &'p Option<PathBuf>, what: &str) -> Result<&'p Path, PredictError> {
    path.as_deref().ok_or_else(|| {
        PredictError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{what} was not rendered"),
        ))
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Deflate every regular file directly inside `dir`, sorted by name
pub fn zip_directory(dir: &Path) -> Result<Vec<u8>, PredictError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for path in &files {
        writer.start_file(file_name(path), options)?;
        io::copy(&mut File::open(path)?, &mut writer)?;
    }

    Ok(writer.finish()?.into_inner())
}
