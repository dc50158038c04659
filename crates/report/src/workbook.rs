use crate::{Cell, ReportError, Table};
use rust_xlsxwriter::{Format, Workbook};
use std::path::Path;

pub const DETECTION_SHEET: &str = "Litter Detection";
pub const QUANTIFICATION_SHEET: &str = "Litter Quantification";

/// Write `sheets` into a new `.xlsx` file, one worksheet per table.
///
/// Each sheet starts with an `index` column holding the row position.
pub fn write_workbook(path: &Path, sheets: &[(&str, &Table)]) -> Result<(), ReportError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    for (name, table) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*name)?;

        worksheet.write_string_with_format(0, 0, "index", &header)?;
        for (col, column) in table.columns.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16 + 1, column, &header)?;
        }

        for (index, row) in table.rows.iter().enumerate() {
            let r = index as u32 + 1;
            worksheet.write_number(r, 0, index as f64)?;
            for (col, cell) in row.iter().enumerate() {
                let c = col as u16 + 1;
                match cell {
                    Cell::Text(text) => worksheet.write_string(r, c, text)?,
                    Cell::Number(value) => worksheet.write_number(r, c, *value)?,
                };
            }
        }
    }

    workbook.save(path)?;
    tracing::debug!(path = %path.display(), sheets = sheets.len(), "Workbook written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{Reader, Xlsx, open_workbook};
    use tempfile::tempdir;

    #[test]
    fn test_workbook_has_named_sheets_with_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("image_litter_items.xlsx");

        let mut detection = Table::new(["label", "confidence"]);
        detection.push(vec!["Sand".into(), 0.75f32.into()]);
        detection.push(vec!["Water".into(), 0.5f32.into()]);
        let quantification = Table::new(["label"]);

        write_workbook(
            &path,
            &[
                (DETECTION_SHEET, &detection),
                (QUANTIFICATION_SHEET, &quantification),
            ],
        )
        .unwrap();

        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        assert_eq!(
            workbook.sheet_names(),
            vec![DETECTION_SHEET.to_string(), QUANTIFICATION_SHEET.to_string()]
        );

        let range = workbook.worksheet_range(DETECTION_SHEET).unwrap();
        assert_eq!(range.get_size(), (3, 3), "header + two rows, index + two columns");
        assert_eq!(range.get((0, 0)).unwrap().to_string(), "index");
        assert_eq!(range.get((2, 1)).unwrap().to_string(), "Water");
    }
}
