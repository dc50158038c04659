/// A rectangular region of an image, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Regular grid of square tiles anchored at `origin`.
///
/// Only whole tiles are part of the grid; the strip on the right and bottom
/// edges that does not fill a tile is left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub rows: usize,
    pub cols: usize,
    pub tile_size: u32,
    pub origin: (u32, u32),
}

impl TileGrid {
    /// Grid of `tile_size` tiles covering a full `width` x `height` image
    pub fn for_image(width: u32, height: u32, tile_size: u32) -> Self {
        Self::cover(
            TileRect {
                x: 0,
                y: 0,
                width,
                height,
            },
            tile_size,
        )
    }

    /// Grid of `tile_size` tiles covering `region`
    pub fn cover(region: TileRect, tile_size: u32) -> Self {
        let (rows, cols) = if tile_size == 0 {
            (0, 0)
        } else {
            (
                (region.height / tile_size) as usize,
                (region.width / tile_size) as usize,
            )
        };

        Self {
            rows,
            cols,
            tile_size,
            origin: (region.x, region.y),
        }
    }

    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tile(&self, row: usize, col: usize) -> TileRect {
        TileRect {
            x: self.origin.0 + col as u32 * self.tile_size,
            y: self.origin.1 + row as u32 * self.tile_size,
            width: self.tile_size,
            height: self.tile_size,
        }
    }

    /// Tiles in row-major order together with their (row, col) position
    pub fn tiles(&self) -> impl Iterator<Item = (usize, usize, TileRect)> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.cols).map(move |col| (row, col, self.tile(row, col))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_drops_partial_edge_tiles() {
        let grid = TileGrid::for_image(1000, 650, 256);
        assert_eq!(grid.cols, 3, "1000 / 256 = 3 whole tiles");
        assert_eq!(grid.rows, 2, "650 / 256 = 2 whole tiles");
        assert_eq!(grid.len(), 6);
    }

    #[test]
    fn tiles_are_row_major() {
        let grid = TileGrid::for_image(20, 20, 10);
        let positions: Vec<_> = grid.tiles().map(|(r, c, _)| (r, c)).collect();
        assert_eq!(positions, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);

        let last = grid.tile(1, 1);
        assert_eq!(
            last,
            TileRect {
                x: 10,
                y: 10,
                width: 10,
                height: 10
            }
        );
    }

    #[test]
    fn sub_grid_is_offset_by_region_origin() {
        let parent = TileRect {
            x: 200,
            y: 100,
            width: 100,
            height: 100,
        };
        let grid = TileGrid::cover(parent, 50);
        assert_eq!(grid.len(), 4);
        assert_eq!(grid.tile(0, 0).x, 200);
        assert_eq!(grid.tile(1, 1).y, 150);
    }

    #[test]
    fn image_smaller_than_tile_yields_empty_grid() {
        assert!(TileGrid::for_image(100, 100, 256).is_empty());
        assert!(TileGrid::for_image(100, 100, 0).is_empty());
    }
}
