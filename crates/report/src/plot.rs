use crate::ReportError;
use ab_glyph::{FontVec, PxScale};
use image::{
    Rgb, RgbImage,
    codecs::jpeg::JpegEncoder,
    imageops::{self, FilterType},
};
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut},
    rect::Rect,
};
use inference::{DetectionResult, LabelSet, QuantificationResult};
use preprocess::TileRect;
use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufWriter, path::Path};

const PALETTE: [[u8; 3]; 10] = [
    [230, 25, 75],
    [255, 140, 0],
    [128, 96, 0],
    [145, 30, 180],
    [240, 200, 80],
    [128, 128, 128],
    [60, 180, 75],
    [0, 130, 200],
    [70, 240, 240],
    [250, 190, 212],
];
const GRID_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const LEGEND_BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const LEGEND_TEXT: Rgb<u8> = Rgb([20, 20, 20]);
const LEGEND_ROW_HEIGHT: u32 = 28;
const LEGEND_SWATCH: u32 = 18;
const LEGEND_FONT_SIZE: f32 = 18.0;
const JPEG_QUALITY: u8 = 90;

/// Which stage a plot shows; also the file name suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotKind {
    Pld,
    Plq,
}

impl PlotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlotKind::Pld => "PLD",
            PlotKind::Plq => "PLQ",
        }
    }

    /// `<output_path>_<PLD|PLQ>.jpg`
    pub fn file_name(&self, output_path: &str) -> String {
        format!("{}_{}.jpg", output_path, self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotStyle {
    /// Plots wider than this are downscaled first
    pub max_width: u32,
    /// Opacity of the class overlay, 0.0 to 1.0
    pub alpha: f32,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            max_width: 1600,
            alpha: 0.45,
        }
    }
}

/// Renders classification results on top of the analysed image.
///
/// Without a font the legend only shows color swatches.
pub struct ResultPlot {
    style: PlotStyle,
    font: Option<FontVec>,
}

impl ResultPlot {
    pub fn new(style: PlotStyle) -> Self {
        Self { style, font: None }
    }

    pub fn with_font_file(mut self, path: &Path) -> Result<Self, ReportError> {
        let data = std::fs::read(path)?;
        let font = FontVec::try_from_vec(data)
            .map_err(|_| ReportError::Font(path.display().to_string()))?;
        self.font = Some(font);
        Ok(self)
    }

    /// Every detection tile tinted with its class color
    pub fn render_detection(&self, image: &RgbImage, result: &DetectionResult) -> RgbImage {
        let (mut canvas, scale) = self.base(image);

        for (row, col, rect) in result.grid.tiles() {
            let class = result.c_matrix[[row, col]];
            let rect = scale_rect(&rect, scale);
            self.tint(&mut canvas, &rect, color(class));
            outline(&mut canvas, &rect);
        }

        let counts = result.class_counts();
        self.with_legend(canvas, &result.labels, &counts)
    }

    /// Quantified sub-tiles tinted with their class color, litter tiles outlined
    pub fn render_quantification(&self, image: &RgbImage, result: &QuantificationResult) -> RgbImage {
        let (mut canvas, scale) = self.base(image);

        for item in &result.items {
            let rect = scale_rect(&item.rect, scale);
            self.tint(&mut canvas, &rect, color(item.class_id));
        }

        let mut parents: Vec<_> = result.items.iter().map(|i| (i.tile_row, i.tile_col)).collect();
        parents.dedup();
        for (row, col) in parents {
            if let Some(first) = result
                .items
                .iter()
                .find(|i| i.tile_row == row && i.tile_col == col)
            {
                let parent = parent_rect(first, result.sub_tile_size, &result.items);
                outline(&mut canvas, &scale_rect(&parent, scale));
            }
        }

        let counts = result.class_counts();
        self.with_legend(canvas, &result.labels, &counts)
    }

    fn base(&self, image: &RgbImage) -> (RgbImage, f32) {
        let (width, height) = image.dimensions();
        if width <= self.style.max_width || width == 0 {
            return (image.clone(), 1.0);
        }

        let scale = self.style.max_width as f32 / width as f32;
        let new_height = ((height as f32 * scale).round() as u32).max(1);
        (
            imageops::resize(image, self.style.max_width, new_height, FilterType::Triangle),
            scale,
        )
    }

    fn tint(&self, canvas: &mut RgbImage, rect: &TileRect, tint: Rgb<u8>) {
        let alpha = self.style.alpha.clamp(0.0, 1.0);
        let x_end = (rect.x + rect.width).min(canvas.width());
        let y_end = (rect.y + rect.height).min(canvas.height());

        for y in rect.y..y_end {
            for x in rect.x..x_end {
                let px = canvas.get_pixel_mut(x, y);
                for c in 0..3 {
                    px.0[c] = (px.0[c] as f32 * (1.0 - alpha) + tint.0[c] as f32 * alpha).round() as u8;
                }
            }
        }
    }

    fn with_legend(&self, plot: RgbImage, labels: &LabelSet, counts: &[usize]) -> RgbImage {
        let legend_height = LEGEND_ROW_HEIGHT * labels.len() as u32 + LEGEND_ROW_HEIGHT / 2;
        let mut canvas = RgbImage::from_pixel(
            plot.width(),
            plot.height() + legend_height,
            LEGEND_BACKGROUND,
        );
        imageops::replace(&mut canvas, &plot, 0, 0);

        for (class, label) in labels.iter().enumerate() {
            let y = (plot.height() + LEGEND_ROW_HEIGHT / 2 + class as u32 * LEGEND_ROW_HEIGHT) as i32;
            draw_filled_rect_mut(
                &mut canvas,
                Rect::at(10, y).of_size(LEGEND_SWATCH, LEGEND_SWATCH),
                color(class),
            );

            if let Some(font) = &self.font {
                let count = counts.get(class).copied().unwrap_or(0);
                draw_text_mut(
                    &mut canvas,
                    LEGEND_TEXT,
                    10 + LEGEND_SWATCH as i32 + 8,
                    y,
                    PxScale::from(LEGEND_FONT_SIZE),
                    font,
                    &format!("{label} ({count})"),
                );
            }
        }

        canvas
    }

    /// Encode `plot` as JPEG at `path`
    pub fn save(&self, plot: &RgbImage, path: &Path) -> Result<(), ReportError> {
        let file = File::create(path)?;
        let mut encoder = JpegEncoder::new_with_quality(BufWriter::new(file), JPEG_QUALITY);
        encoder.encode_image(plot)?;
        tracing::debug!(path = %path.display(), "Plot written");
        Ok(())
    }
}

fn color(class: usize) -> Rgb<u8> {
    Rgb(PALETTE[class % PALETTE.len()])
}

fn scale_rect(rect: &TileRect, scale: f32) -> TileRect {
    TileRect {
        x: (rect.x as f32 * scale).round() as u32,
        y: (rect.y as f32 * scale).round() as u32,
        width: ((rect.width as f32 * scale).round() as u32).max(1),
        height: ((rect.height as f32 * scale).round() as u32).max(1),
    }
}

fn outline(canvas: &mut RgbImage, rect: &TileRect) {
    draw_hollow_rect_mut(
        canvas,
        Rect::at(rect.x as i32, rect.y as i32).of_size(rect.width, rect.height),
        GRID_COLOR,
    );
}

/// Bounding box of all sub-tiles sharing the parent tile of `item`
fn parent_rect(item: &inference::QuantifiedItem, sub_tile_size: u32, items: &[inference::QuantifiedItem]) -> TileRect {
    let siblings = items
        .iter()
        .filter(|i| i.tile_row == item.tile_row && i.tile_col == item.tile_col);

    let (mut x0, mut y0, mut x1, mut y1) = (u32::MAX, u32::MAX, 0, 0);
    for s in siblings {
        x0 = x0.min(s.rect.x);
        y0 = y0.min(s.rect.y);
        x1 = x1.max(s.rect.x + sub_tile_size);
        y1 = y1.max(s.rect.y + sub_tile_size);
    }

    TileRect {
        x: x0,
        y: y0,
        width: x1.saturating_sub(x0),
        height: y1.saturating_sub(y0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inference::testing::{ColorRuleBackend, quadrant_image};
    use inference::{Classifier, StageConfig, stages};
    use tempfile::tempdir;

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
    fn test_file_name_suffix() {
        assert_eq!(PlotKind::Pld.file_name("/tmp/x/beach"), "/tmp/x/beach_PLD.jpg");
        assert_eq!(PlotKind::Plq.file_name("beach"), "beach_PLQ.jpg");
    }

    #[test]
    fn test_detection_plot_adds_legend_rows() {
        let image = quadrant_image(64);
        let detection = stages::detect(&mut classifier(32), &image).unwrap();

        let plot = ResultPlot::new(PlotStyle::default()).render_detection(&image, &detection);

        assert_eq!(plot.width(), 64);
        assert_eq!(plot.height(), 64 + 4 * LEGEND_ROW_HEIGHT + LEGEND_ROW_HEIGHT / 2);
    }

    #[test]
    fn test_wide_images_are_downscaled() {
        let image = RgbImage::from_pixel(400, 200, Rgb([200, 10, 10]));
        let mut pld = classifier(100);
        let detection = stages::detect(&mut pld, &image).unwrap();

        let style = PlotStyle {
            max_width: 200,
            ..PlotStyle::default()
        };
        let plot = ResultPlot::new(style).render_detection(&image, &detection);
        assert_eq!(plot.width(), 200);
    }

    #[test]
    fn test_quantification_plot_saves_as_jpeg() {
        let dir = tempdir().unwrap();
        let image = quadrant_image(64);
        let detection = stages::detect(&mut classifier(32), &image).unwrap();
        let result = stages::quantify(&mut classifier(16), &detection, &image, &[0]).unwrap();

        let plotter = ResultPlot::new(PlotStyle::default());
        let plot = plotter.render_quantification(&image, &result);
        let path = dir.path().join(PlotKind::Plq.file_name("quadrants"));
        plotter.save(&plot, &path).unwrap();

        let decoded = image::open(&path).unwrap();
        assert_eq!(decoded.width(), plot.width());
    }

    #[test]
    fn test_missing_font_file_is_an_error() {
        let result = ResultPlot::new(PlotStyle::default()).with_font_file(Path::new("/nonexistent/font.ttf"));
        assert!(matches!(result, Err(ReportError::Io(_))));
    }
}
