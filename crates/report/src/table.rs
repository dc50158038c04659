use inference::{DetectionResult, QuantificationResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<f32> for Cell {
    fn from(value: f32) -> Self {
        Cell::Number(value as f64)
    }
}

impl From<usize> for Cell {
    fn from(value: usize) -> Self {
        Cell::Number(value as f64)
    }
}

impl From<u32> for Cell {
    fn from(value: u32) -> Self {
        Cell::Number(value as f64)
    }
}

/// Column-named rows; the row position is the item index
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.columns.len(), "row width must match columns");
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// One row per detection tile, row-major
pub fn detection_table(result: &DetectionResult) -> Table {
    let mut table = Table::new([
        "tile_row",
        "tile_col",
        "x",
        "y",
        "size",
        "class_id",
        "label",
        "confidence",
    ]);

    for (row, col, rect) in result.grid.tiles() {
        table.push(vec![
            row.into(),
            col.into(),
            rect.x.into(),
            rect.y.into(),
            rect.width.into(),
            result.c_matrix[[row, col]].into(),
            result.label_at(row, col).into(),
            result.confidence[[row, col]].into(),
        ]);
    }

    table
}

/// One row per quantified sub-tile
pub fn quantification_table(result: &QuantificationResult) -> Table {
    let mut table = Table::new([
        "tile_row",
        "tile_col",
        "sub_row",
        "sub_col",
        "x",
        "y",
        "size",
        "class_id",
        "label",
        "confidence",
    ]);

    for item in &result.items {
        table.push(vec![
            item.tile_row.into(),
            item.tile_col.into(),
            item.sub_row.into(),
            item.sub_col.into(),
            item.rect.x.into(),
            item.rect.y.into(),
            item.rect.width.into(),
            item.class_id.into(),
            item.label.clone().into(),
            item.confidence.into(),
        ]);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use inference::testing::{ColorRuleBackend, quadrant_image};
    use inference::{Classifier, StageConfig, stages};

    fn classifier(tile_size: u32) -> Classifier<ColorRuleBackend> {
        let config = StageConfig {
            tile_size,
            input_width: 8,
            input_height: 8,
            labels: ["red", "green", "blue", "other"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ..StageConfig::pld_default()
        };
        Classifier::new(ColorRuleBackend::new(4), &config)
    }

    #[test]
    fn detection_table_has_one_row_per_tile() {
        let image = quadrant_image(64);
        let detection = stages::detect(&mut classifier(32), &image).unwrap();

        let table = detection_table(&detection);
        assert_eq!(table.len(), 4);

        let label = table.column("label").unwrap();
        assert_eq!(table.rows[1][label], Cell::Text("green".into()));
        let x = table.column("x").unwrap();
        assert_eq!(table.rows[1][x], Cell::Number(32.0));
    }

    #[test]
    fn quantification_table_lists_items() {
        let image = quadrant_image(64);
        let detection = stages::detect(&mut classifier(32), &image).unwrap();
        let result = stages::quantify(&mut classifier(16), &detection, &image, &[1]).unwrap();

        let table = quantification_table(&result);
        assert_eq!(table.len(), 4);
        assert_eq!(table.columns.len(), 10);
        let tile_col = table.column("tile_col").unwrap();
        assert!(table.rows.iter().all(|r| r[tile_col] == Cell::Number(1.0)));
    }
}
