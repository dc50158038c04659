//! The two classification stages.
//!
//! Detection (PLD) classifies every tile of an image and produces the class
//! matrix (`c_matrix`). Quantification (PLQ) only ever looks at tiles that
//! detection marked as litter, so it takes a [`DetectionResult`] for the same
//! image as an argument.

use crate::{
    backend::ClassifierBackend, config::StageConfig, error::InferenceError, labels::LabelSet,
    postprocessing::{argmax_rows, softmax_rows},
};
use common::span;
use image::RgbImage;
use ndarray::{Array2, Array3};
use preprocess::{CpuPreProcessor, Preprocess, TileGrid, TileRect};

/// Winning class of one tile
#[derive(Debug, Clone, PartialEq)]
pub struct TilePrediction {
    pub class_id: usize,
    pub confidence: f32,
    pub scores: Vec<f32>,
}

/// A backend together with the preprocessing and labels of its stage
pub struct Classifier<B: ClassifierBackend> {
    backend: B,
    preprocessor: CpuPreProcessor,
    labels: LabelSet,
    tile_size: u32,
    apply_softmax: bool,
    batch_size: usize,
}

impl<B: ClassifierBackend> Classifier<B> {
    pub fn new(backend: B, config: &StageConfig) -> Self {
        Self {
            backend,
            preprocessor: CpuPreProcessor::new(
                config.input_size(),
                config.layout,
                config.normalization,
            ),
            labels: LabelSet::new(config.labels.iter().cloned()),
            tile_size: config.tile_size,
            apply_softmax: config.apply_softmax,
            batch_size: config.batch_size.max(1),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Classify `tiles` of `image`, `batch_size` tiles per model call
    pub fn classify_tiles(
        &mut self,
        image: &RgbImage,
        tiles: &[TileRect],
    ) -> Result<Vec<TilePrediction>, InferenceError> {
        let (width, height) = image.dimensions();
        let mut predictions = Vec::with_capacity(tiles.len());

        for chunk in tiles.chunks(self.batch_size) {
            let batch = self
                .preprocessor
                .preprocess_tiles(image.as_raw(), width, height, chunk)?;

            let mut scores = {
                let _infer_span = span!("model_inference");
                self.backend.classify(batch.view())?
            };

            if scores.nrows() != chunk.len() || scores.ncols() != self.labels.len() {
                return Err(InferenceError::OutputShape {
                    expected: format!("[{}, {}]", chunk.len(), self.labels.len()),
                    got: format!("{:?}", scores.shape()),
                });
            }

            if self.apply_softmax {
                softmax_rows(&mut scores);
            }

            for (row, (class_id, confidence)) in argmax_rows(scores.view()).into_iter().enumerate() {
                predictions.push(TilePrediction {
                    class_id,
                    confidence,
                    scores: scores.row(row).to_vec(),
                });
            }
        }

        Ok(predictions)
    }
}

/// Output of the detection stage for one image
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub image_size: (u32, u32),
    pub grid: TileGrid,
    /// Class index of every tile, `[rows, cols]`
    pub c_matrix: Array2<usize>,
    /// Score of the winning class of every tile, `[rows, cols]`
    pub confidence: Array2<f32>,
    /// Full score vector of every tile, `[rows, cols, classes]`
    pub scores: Array3<f32>,
    pub labels: LabelSet,
}

impl DetectionResult {
    pub fn label_at(&self, row: usize, col: usize) -> String {
        self.labels.name(self.c_matrix[[row, col]])
    }

    /// Number of tiles per class, indexed like the labels
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.labels.len()];
        for &class in self.c_matrix.iter() {
            if let Some(count) = counts.get_mut(class) {
                *count += 1;
            }
        }
        counts
    }

    /// Tiles whose class is one of `classes`, row-major
    pub fn tiles_of(&self, classes: &[usize]) -> Vec<(usize, usize, TileRect)> {
        self.grid
            .tiles()
            .filter(|(row, col, _)| classes.contains(&self.c_matrix[[*row, *col]]))
            .collect()
    }
}

/// One classified sub-tile inside a litter tile
#[derive(Debug, Clone, PartialEq)]
pub struct QuantifiedItem {
    pub tile_row: usize,
    pub tile_col: usize,
    pub sub_row: usize,
    pub sub_col: usize,
    pub rect: TileRect,
    pub class_id: usize,
    pub label: String,
    pub confidence: f32,
}

/// Output of the quantification stage for one image
#[derive(Debug, Clone)]
pub struct QuantificationResult {
    pub image_size: (u32, u32),
    pub sub_tile_size: u32,
    /// Number of detection tiles that were quantified
    pub litter_tiles: usize,
    pub items: Vec<QuantifiedItem>,
    pub labels: LabelSet,
}

impl QuantificationResult {
    /// Number of sub-tiles per class, indexed like the labels
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.labels.len()];
        for item in &self.items {
            if let Some(count) = counts.get_mut(item.class_id) {
                *count += 1;
            }
        }
        counts
    }
}

/// Run the detection model over every whole tile of `image`
pub fn detect<B: ClassifierBackend>(
    pld: &mut Classifier<B>,
    image: &RgbImage,
) -> Result<DetectionResult, InferenceError> {
    let _s = span!("detect");

    let (width, height) = image.dimensions();
    let grid = TileGrid::for_image(width, height, pld.tile_size());
    if grid.is_empty() {
        return Err(InferenceError::ImageTooSmall {
            width,
            height,
            tile_size: pld.tile_size(),
        });
    }

    let tiles: Vec<TileRect> = grid.tiles().map(|(_, _, tile)| tile).collect();
    let predictions = pld.classify_tiles(image, &tiles)?;

    let num_classes = pld.labels().len();
    let mut c_matrix = Array2::zeros((grid.rows, grid.cols));
    let mut confidence = Array2::zeros((grid.rows, grid.cols));
    let mut scores = Array3::zeros((grid.rows, grid.cols, num_classes));

    for ((row, col, _), prediction) in grid.tiles().zip(predictions) {
        c_matrix[[row, col]] = prediction.class_id;
        confidence[[row, col]] = prediction.confidence;
        for (class, score) in prediction.scores.into_iter().enumerate() {
            scores[[row, col, class]] = score;
        }
    }

    tracing::debug!(
        width,
        height,
        rows = grid.rows,
        cols = grid.cols,
        "Detection finished"
    );

    Ok(DetectionResult {
        image_size: (width, height),
        grid,
        c_matrix,
        confidence,
        scores,
        labels: pld.labels().clone(),
    })
}

/// Classify the sub-tiles of every detection tile whose class is in
/// `litter_classes`.
///
/// `detection` must come from [`detect`] on the same image.
pub fn quantify<B: ClassifierBackend>(
    plq: &mut Classifier<B>,
    detection: &DetectionResult,
    image: &RgbImage,
    litter_classes: &[usize],
) -> Result<QuantificationResult, InferenceError> {
    let _s = span!("quantify");

    if detection.image_size != image.dimensions() {
        return Err(InferenceError::InvalidConfig(format!(
            "detection result is for a {:?} image but quantification got {:?}",
            detection.image_size,
            image.dimensions()
        )));
    }

    let litter_tiles = detection.tiles_of(litter_classes);

    let mut positions = Vec::new();
    let mut sub_tiles = Vec::new();
    for (tile_row, tile_col, tile) in &litter_tiles {
        let sub_grid = TileGrid::cover(*tile, plq.tile_size());
        for (sub_row, sub_col, rect) in sub_grid.tiles() {
            positions.push((*tile_row, *tile_col, sub_row, sub_col));
            sub_tiles.push(rect);
        }
    }

    let predictions = if sub_tiles.is_empty() {
        Vec::new()
    } else {
        plq.classify_tiles(image, &sub_tiles)?
    };

    let items = positions
        .into_iter()
        .zip(sub_tiles)
        .zip(predictions)
        .map(
            |(((tile_row, tile_col, sub_row, sub_col), rect), prediction)| QuantifiedItem {
                tile_row,
                tile_col,
                sub_row,
                sub_col,
                rect,
                class_id: prediction.class_id,
                label: plq.labels().name(prediction.class_id),
                confidence: prediction.confidence,
            },
        )
        .collect::<Vec<_>>();

    tracing::debug!(
        litter_tiles = litter_tiles.len(),
        items = items.len(),
        "Quantification finished"
    );

    Ok(QuantificationResult {
        image_size: detection.image_size,
        sub_tile_size: plq.tile_size(),
        litter_tiles: litter_tiles.len(),
        items,
        labels: plq.labels().clone(),
    })
}
