use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("workbook error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("invalid font file {0}")]
    Font(String),
}
