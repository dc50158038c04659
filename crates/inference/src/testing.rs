//! Deterministic classifier backend for tests.
//!
//! [`ColorRuleBackend`] classifies a tile by its dominant color channel:
//! red → class 0, green → class 1, blue → class 2, anything else → the last
//! class. Model files for it are plain text holding the number of classes,
//! so tests can exercise the real loading path.

use crate::backend::{BackendOptions, ClassifierBackend};
use image::{Rgb, RgbImage};
use ndarray::{Array2, ArrayView4, Axis};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

static SEQUENCE: AtomicU64 = AtomicU64::new(1);
static INSTANCES: AtomicU64 = AtomicU64::new(1);

/// One `classify` invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallRecord {
    /// Process-wide ordering of calls across all backends
    pub sequence: u64,
    pub batch: usize,
}

#[derive(Debug)]
pub struct ColorRuleBackend {
    num_classes: usize,
    instance: u64,
    calls: Vec<CallRecord>,
}

impl ColorRuleBackend {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes: num_classes.max(1),
            instance: INSTANCES.fetch_add(1, Ordering::SeqCst),
            calls: Vec::new(),
        }
    }

    /// Unique id of this backend, stable for its whole lifetime
    pub fn instance(&self) -> u64 {
        self.instance
    }

    pub fn calls(&self) -> &[CallRecord] {
        &self.calls
    }

    fn classify_means(&self, means: [f32; 3]) -> usize {
        let (best, best_value) = means
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::MIN), |acc, (i, v)| if v > acc.1 { (i, v) } else { acc });
        let runner_up = means
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != best)
            .map(|(_, v)| *v)
            .fold(f32::MIN, f32::max);

        if best_value - runner_up > 0.2 {
            best.min(self.num_classes - 1)
        } else {
            self.num_classes - 1
        }
    }
}

/// Write a model file understood by [`ColorRuleBackend::load_model`]
pub fn write_model_file(path: &Path, num_classes: usize) -> std::io::Result<()> {
    std::fs::write(path, format!("{num_classes}\n"))
}

impl ClassifierBackend for ColorRuleBackend {
    fn load_model(path: &Path, _options: &BackendOptions) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let num_classes = contents.trim().parse()?;
        Ok(Self::new(num_classes))
    }

    fn classify(&mut self, batch: ArrayView4<'_, f32>) -> anyhow::Result<Array2<f32>> {
        self.calls.push(CallRecord {
            sequence: SEQUENCE.fetch_add(1, Ordering::SeqCst),
            batch: batch.len_of(Axis(0)),
        });

        // Channels last when the trailing axis has three entries
        let channel_axis = if batch.shape()[3] == 3 { 3 } else { 1 };

        let mut scores = Array2::<f32>::from_elem((batch.len_of(Axis(0)), self.num_classes), 0.0);
        for (i, tile) in batch.axis_iter(Axis(0)).enumerate() {
            let mut means = [0.0f32; 3];
            for (c, mean) in means.iter_mut().enumerate() {
                let channel = tile.index_axis(Axis(channel_axis - 1), c);
                *mean = channel.mean().unwrap_or(0.0);
            }

            let class = self.classify_means(means);
            let rest = if self.num_classes > 1 {
                0.1 / (self.num_classes - 1) as f32
            } else {
                0.0
            };
            scores.row_mut(i).fill(rest);
            scores[[i, class]] = 0.9;
        }

        Ok(scores)
    }
}

/// Square image split into red, green, blue and gray quadrants
pub fn quadrant_image(size: u32) -> RgbImage {
    let half = size / 2;
    RgbImage::from_fn(size, size, |x, y| match (x < half, y < half) {
        (true, true) => Rgb([230, 10, 10]),
        (false, true) => Rgb([10, 230, 10]),
        (true, false) => Rgb([10, 10, 230]),
        (false, false) => Rgb([128, 128, 128]),
    })
}
