//! Per-tile coefficient tables
//!
//! A table holds, for every output tile in raster order, the four source
//! corner positions (Q4 fixed point, luma pixels) and the bounding box of
//! source pixels the tile may read. Tables are normally produced by an
//! external calibration step; [`CoefficientTable::from_mapping`] builds one
//! from any output-to-source mapping for tooling and tests.

use crate::error::{DewarpError, Result};

/// Fractional bits of the corner coordinates.
pub const CORNER_Q: u32 = 4;

/// Bytes occupied by one tile in the binary table format.
pub const TILE_RECORD_BYTES: usize = 24;

/// Largest frame side whose Q4 coordinates still fit in an `i16`.
pub const MAX_FRAME_SIDE: u32 = i16::MAX as u32 >> CORNER_Q;

/// A source position in Q4 fixed point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CornerPoint {
    pub x: i16,
    pub y: i16,
}

impl CornerPoint {
    pub fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }

    /// Quantise a source position in pixels to Q4. `None` when either
    /// coordinate does not fit in an `i16`.
    pub fn try_from_pixels(px: f64, py: f64) -> Option<Self> {
        let scale = (1u32 << CORNER_Q) as f64;
        let q = |v: f64| {
            let v = (v * scale).round();
            (i16::MIN as f64..=i16::MAX as f64).contains(&v).then_some(v as i16)
        };
        Some(Self { x: q(px)?, y: q(py)? })
    }
}

/// The four corner correspondences of one tile.
/// Order: top-left, top-right, bottom-left, bottom-right
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CornerSet {
    pub corners: [CornerPoint; 4],
}

impl CornerSet {
    pub const TOP_LEFT: usize = 0;
    pub const TOP_RIGHT: usize = 1;
    pub const BOTTOM_LEFT: usize = 2;
    pub const BOTTOM_RIGHT: usize = 3;

    pub fn new(tl: CornerPoint, tr: CornerPoint, bl: CornerPoint, br: CornerPoint) -> Self {
        Self {
            corners: [tl, tr, bl, br],
        }
    }

    /// Inclusive Q4 extent of the corners: (min_x, min_y, max_x, max_y)
    pub fn extent(&self) -> (i32, i32, i32, i32) {
        let xs = self.corners.map(|c| c.x as i32);
        let ys = self.corners.map(|c| c.y as i32);
        (
            xs.into_iter().min().unwrap_or(0),
            ys.into_iter().min().unwrap_or(0),
            xs.into_iter().max().unwrap_or(0),
            ys.into_iter().max().unwrap_or(0),
        )
    }
}

/// Source region a tile may read, in integer luma pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundingBox {
    pub origin_x: u16,
    pub origin_y: u16,
    pub width: u16,
    pub height: u16,
}

impl BoundingBox {
    pub fn new(origin_x: u16, origin_y: u16, width: u16, height: u16) -> Self {
        Self {
            origin_x,
            origin_y,
            width,
            height,
        }
    }

    /// Smallest box around `corners` that also holds the right/bottom
    /// neighbour of every sample, clipped to the source frame.
    pub fn around(corners: &CornerSet, frame_width: u32, frame_height: u32) -> Self {
        let (min_x, min_y, max_x, max_y) = corners.extent();
        let span = |lo: i32, hi: i32, limit: u32| {
            let limit = limit as i32;
            let start = (lo >> CORNER_Q).clamp(0, limit);
            let end = ((hi >> CORNER_Q) + 2).clamp(start, limit);
            (start as u16, (end - start) as u16)
        };
        let (origin_x, width) = span(min_x, max_x, frame_width);
        let (origin_y, height) = span(min_y, max_y, frame_height);
        Self {
            origin_x,
            origin_y,
            width,
            height,
        }
    }
}

/// Everything the warp needs to render one tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileCoefficients {
    pub corners: CornerSet,
    pub bbox: BoundingBox,
}

impl TileCoefficients {
    fn write_to(&self, out: &mut Vec<u8>) {
        for c in &self.corners.corners {
            out.extend_from_slice(&c.x.to_le_bytes());
            out.extend_from_slice(&c.y.to_le_bytes());
        }
        for v in [
            self.bbox.origin_x,
            self.bbox.origin_y,
            self.bbox.width,
            self.bbox.height,
        ] {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn read_from(record: &[u8]) -> Self {
        let word = |i: usize| [record[2 * i], record[2 * i + 1]];
        let corner = |n: usize| {
            CornerPoint::new(
                i16::from_le_bytes(word(2 * n)),
                i16::from_le_bytes(word(2 * n + 1)),
            )
        };
        Self {
            corners: CornerSet {
                corners: [corner(0), corner(1), corner(2), corner(3)],
            },
            bbox: BoundingBox::new(
                u16::from_le_bytes(word(8)),
                u16::from_le_bytes(word(9)),
                u16::from_le_bytes(word(10)),
                u16::from_le_bytes(word(11)),
            ),
        }
    }
}

/// Returns an error unless `tile_size` is a power of two in 4..=128.
pub fn validate_tile_size(tile_size: u32) -> Result<()> {
    if tile_size.is_power_of_two() && (4..=128).contains(&tile_size) {
        Ok(())
    } else {
        Err(DewarpError::InvalidTileSize(tile_size))
    }
}

/// Number of tiles needed to cover `len` pixels.
pub fn tiles_for(len: u32, tile_size: u32) -> u32 {
    len.div_ceil(tile_size)
}

/// Flat, raster-ordered table of per-tile coefficients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoefficientTable {
    tile_size: u32,
    cols: u32,
    rows: u32,
    tiles: Vec<TileCoefficients>,
}

impl CoefficientTable {
    /// Wrap an existing tile list. `tiles.len()` must equal `cols * rows`.
    pub fn new(tile_size: u32, cols: u32, rows: u32, tiles: Vec<TileCoefficients>) -> Result<Self> {
        validate_tile_size(tile_size)?;
        let expected = (cols * rows) as usize;
        if tiles.len() != expected {
            return Err(DewarpError::TableSize {
                expected: expected * TILE_RECORD_BYTES,
                actual: tiles.len() * TILE_RECORD_BYTES,
            });
        }
        Ok(Self {
            tile_size,
            cols,
            rows,
            tiles,
        })
    }

    /// Build a table by evaluating `map` (output pixel -> source pixel) at
    /// every tile-grid vertex of a `width` x `height` frame.
    pub fn from_mapping<F>(width: u32, height: u32, tile_size: u32, map: F) -> Result<Self>
    where
        F: Fn(f64, f64) -> (f64, f64),
    {
        validate_tile_size(tile_size)?;
        check_frame(width, height)?;

        let cols = tiles_for(width, tile_size);
        let rows = tiles_for(height, tile_size);

        // Vertices are shared between neighbouring tiles
        let stride = (cols + 1) as usize;
        let mut vertices = Vec::with_capacity(stride * (rows + 1) as usize);
        for vy in 0..=rows {
            for vx in 0..=cols {
                let (sx, sy) = map((vx * tile_size) as f64, (vy * tile_size) as f64);
                let vertex = CornerPoint::try_from_pixels(sx, sy)
                    .ok_or(DewarpError::CornerOutOfRange { col: vx, row: vy })?;
                vertices.push(vertex);
            }
        }

        let mut tiles = Vec::with_capacity((cols * rows) as usize);
        for row in 0..rows as usize {
            for col in 0..cols as usize {
                let top = row * stride + col;
                let bottom = top + stride;
                let corners = CornerSet::new(
                    vertices[top],
                    vertices[top + 1],
                    vertices[bottom],
                    vertices[bottom + 1],
                );
                tiles.push(TileCoefficients {
                    corners,
                    bbox: BoundingBox::around(&corners, width, height),
                });
            }
        }

        Self::new(tile_size, cols, rows, tiles)
    }

    /// A table that maps every output pixel onto itself.
    pub fn identity(width: u32, height: u32, tile_size: u32) -> Result<Self> {
        Self::from_mapping(width, height, tile_size, |x, y| (x, y))
    }

    /// Parse the little-endian binary format (24 bytes per tile).
    pub fn from_bytes(tile_size: u32, cols: u32, rows: u32, bytes: &[u8]) -> Result<Self> {
        let expected = (cols * rows) as usize * TILE_RECORD_BYTES;
        if bytes.len() != expected {
            return Err(DewarpError::TableSize {
                expected,
                actual: bytes.len(),
            });
        }
        let tiles = bytes
            .chunks_exact(TILE_RECORD_BYTES)
            .map(TileCoefficients::read_from)
            .collect();
        Self::new(tile_size, cols, rows, tiles)
    }

    /// Serialize to the binary format read by [`CoefficientTable::from_bytes`].
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.tiles.len() * TILE_RECORD_BYTES);
        for tile in &self.tiles {
            tile.write_to(&mut out);
        }
        out
    }

    /// Returns an error unless this table tiles a `width` x `height` frame exactly.
    pub fn check_covers(&self, width: u32, height: u32) -> Result<()> {
        if self.cols != tiles_for(width, self.tile_size) || self.rows != tiles_for(height, self.tile_size) {
            return Err(DewarpError::TableGeometry {
                table_cols: self.cols,
                table_rows: self.rows,
                tile_size: self.tile_size,
                frame_width: width,
                frame_height: height,
            });
        }
        Ok(())
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn tile(&self, row: u32, col: u32) -> &TileCoefficients {
        &self.tiles[(row * self.cols + col) as usize]
    }

    pub fn tiles(&self) -> &[TileCoefficients] {
        &self.tiles
    }

    /// Coefficients for one row of tiles
    pub fn row(&self, row: u32) -> &[TileCoefficients] {
        let start = (row * self.cols) as usize;
        &self.tiles[start..start + self.cols as usize]
    }
}

/// Returns an error unless a frame of this size can be warped.
pub fn check_frame(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
        return Err(DewarpError::InvalidDimensions { width, height });
    }
    if width > MAX_FRAME_SIDE || height > MAX_FRAME_SIDE {
        return Err(DewarpError::FrameTooLarge {
            width,
            height,
            max: MAX_FRAME_SIDE,
        });
    }
    Ok(())
}
