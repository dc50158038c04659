//! Tables, workbooks and plots built from classification results.

pub mod error;
pub mod plot;
pub mod table;
pub mod workbook;

pub use error::ReportError;
pub use plot::{PlotKind, PlotStyle, ResultPlot};
pub use table::{Cell, Table, detection_table, quantification_table};
pub use workbook::{DETECTION_SHEET, QUANTIFICATION_SHEET, write_workbook};
