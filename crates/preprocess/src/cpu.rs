use crate::config::{ChannelLayout, DEFAULT_INPUT_SIZE, Normalization};
use crate::{Preprocess, TileRect};
use common::span;
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use ndarray::Array4;

pub struct CpuPreProcessor {
    pub input_size: (u32, u32),
    pub layout: ChannelLayout,
    pub normalization: Normalization,
    resizer: Resizer,
    tile_buffer: Image<'static>,
}

impl CpuPreProcessor {
    pub fn new(input_size: (u32, u32), layout: ChannelLayout, normalization: Normalization) -> Self {
        Self {
            input_size,
            layout,
            normalization,
            resizer: Resizer::new(),
            tile_buffer: Image::new(input_size.0, input_size.1, PixelType::U8x3),
        }
    }

    fn validate(pixels: &[u8], width: u32, height: u32, tiles: &[TileRect]) -> anyhow::Result<()> {
        let expected_size = (width * height * 3) as usize;
        if pixels.len() != expected_size {
            anyhow::bail!(
                "Buffer size mismatch: expected {}, got {} bytes",
                expected_size,
                pixels.len()
            );
        }

        if let Some(tile) = tiles
            .iter()
            .find(|t| t.width == 0 || t.height == 0 || t.x + t.width > width || t.y + t.height > height)
        {
            anyhow::bail!(
                "Tile {:?} does not fit inside a {}x{} image",
                tile,
                width,
                height
            );
        }

        Ok(())
    }

    fn resize_tile(&mut self, src: &ImageRef, tile: &TileRect) -> anyhow::Result<()> {
        let options = ResizeOptions::new()
            .resize_alg(ResizeAlg::Convolution(FilterType::Bilinear))
            .crop(
                tile.x as f64,
                tile.y as f64,
                tile.width as f64,
                tile.height as f64,
            );

        self.resizer.resize(src, &mut self.tile_buffer, &options)?;
        Ok(())
    }

    fn write_tile(&self, batch: &mut Array4<f32>, index: usize) {
        let (w, _) = self.input_size;
        let buf = self.tile_buffer.buffer();

        for (i, px) in buf.chunks_exact(3).enumerate() {
            let y = i / w as usize;
            let x = i % w as usize;
            for (c, value) in px.iter().enumerate() {
                let v = self.normalization.apply(*value, c);
                match self.layout {
                    ChannelLayout::Nhwc => batch[[index, y, x, c]] = v,
                    ChannelLayout::Nchw => batch[[index, c, y, x]] = v,
                }
            }
        }
    }
}

impl Default for CpuPreProcessor {
    fn default() -> Self {
        Self::new(
            DEFAULT_INPUT_SIZE,
            ChannelLayout::default(),
            Normalization::default(),
        )
    }
}

impl Preprocess for CpuPreProcessor {
    fn preprocess_tiles(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        tiles: &[TileRect],
    ) -> anyhow::Result<Array4<f32>> {
        let _s = span!("preprocess_tiles");

        tracing::trace!(
            width,
            height,
            tiles = tiles.len(),
            input_width = self.input_size.0,
            input_height = self.input_size.1,
            "Preprocessing tiles"
        );

        Self::validate(pixels, width, height, tiles)?;

        let (w, h) = (self.input_size.0 as usize, self.input_size.1 as usize);
        let shape = match self.layout {
            ChannelLayout::Nhwc => (tiles.len(), h, w, 3),
            ChannelLayout::Nchw => (tiles.len(), 3, h, w),
        };
        let mut batch = Array4::<f32>::zeros(shape);

        let src = ImageRef::new(width, height, pixels, PixelType::U8x3)?;
        for (index, tile) in tiles.iter().enumerate() {
            self.resize_tile(&src, tile)?;
            self.write_tile(&mut batch, index);
        }

        Ok(batch)
    }

    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }
}
