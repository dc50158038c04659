pub mod config;
pub mod cpu;
pub mod tiles;

use ndarray::Array4;

pub use config::{ChannelLayout, DEFAULT_INPUT_SIZE, Normalization};
pub use cpu::CpuPreProcessor;
pub use tiles::{TileGrid, TileRect};

/// Trait for turning image regions into a model input batch
pub trait Preprocess {
    /// Crop every tile out of an RGB image, resize it to the model input size
    /// and stack the results into one batch.
    ///
    /// # Arguments
    /// * `pixels` - RGB pixel data in HWC format
    /// * `width` - Image width
    /// * `height` - Image height
    /// * `tiles` - Regions to crop, in batch order
    ///
    /// # Returns
    /// A `[N, H, W, 3]` or `[N, 3, H, W]` batch depending on the channel layout
    fn preprocess_tiles(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        tiles: &[TileRect],
    ) -> anyhow::Result<Array4<f32>>;

    /// Get the input size this preprocessor targets
    fn input_size(&self) -> (u32, u32);
}
