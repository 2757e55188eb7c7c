//! Per-pixel source coordinates from four tile corners
//!
//! Every output pixel of a tile is mapped to a fixed-point source position by
//! two nested linear interpolations: first along the top and bottom tile
//! edges (by column), then between those two edge values (by row). All
//! arithmetic is integer with round-half-up, so every implementation that
//! follows these formulas produces the same bits.
//!
//! Luma coordinates are Q4 in luma pixels. Chroma coordinates are Q5 in
//! chroma pixels; because chroma has half the resolution, the Q5 chroma value
//! of a physical location is numerically equal to its Q4 luma value, which
//! is what lets both planes share the corner table.

use crate::coeffs::{BoundingBox, CornerSet, CORNER_Q};

/// Half a luma pixel expressed in Q5 chroma units. 4:2:0 chroma samples sit
/// at the centre of each 2x2 luma block.
pub const CHROMA_PHASE_Q5: i32 = 8;

/// Which plane of an NV12 frame a coordinate addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneKind {
    Luma,
    Chroma,
}

impl PlaneKind {
    /// Fractional bits of coordinates on this plane
    #[inline]
    pub const fn frac_bits(self) -> u32 {
        match self {
            PlaneKind::Luma => 4,
            PlaneKind::Chroma => 5,
        }
    }

    /// Fill value for output pixels with no valid source data
    #[inline]
    pub const fn sentinel(self) -> u8 {
        match self {
            PlaneKind::Luma => 0,
            PlaneKind::Chroma => 128,
        }
    }

    /// Interleaved 8-bit components per sample
    #[inline]
    pub const fn components(self) -> usize {
        match self {
            PlaneKind::Luma => 1,
            PlaneKind::Chroma => 2,
        }
    }

    /// Output samples per tile side
    #[inline]
    pub const fn samples_per_side(self, tile_size: u32) -> u32 {
        match self {
            PlaneKind::Luma => tile_size,
            PlaneKind::Chroma => tile_size / 2,
        }
    }

    /// log2 of the interpolation denominator. Chroma positions are measured
    /// in quarter-samples, so the denominator doubles.
    #[inline]
    const fn weight_shift(self, tile_size: u32) -> u32 {
        match self {
            PlaneKind::Luma => tile_size.trailing_zeros(),
            PlaneKind::Chroma => tile_size.trailing_zeros() + 1,
        }
    }

    /// Interpolation weight numerator for output index `n`: chroma sample
    /// centres land on luma position `2n + 0.5`, i.e. `4n + 1` over `2T`.
    /// Chroma is sited at the 2x2 block centre on both axes, as `rgb_to_nv12` averages it.
    #[inline]
    const fn position(self, n: u32) -> i32 {
        match self {
            PlaneKind::Luma => n as i32,
            PlaneKind::Chroma => (4 * n + 1) as i32,
        }
    }
}

/// A source position in the plane's fixed-point format, relative to the
/// tile's translated origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedCoord {
    pub x: i32,
    pub y: i32,
}

/// Integer and fractional parts of a [`FixedCoord`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitCoord {
    pub xi: i32,
    pub yi: i32,
    pub xf: u32,
    pub yf: u32,
}

impl FixedCoord {
    #[inline]
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Split into integer (floor) and fractional parts with `q` fractional bits.
    #[inline]
    pub fn split(self, q: u32) -> SplitCoord {
        let mask = (1i32 << q) - 1;
        SplitCoord {
            xi: self.x >> q,
            yi: self.y >> q,
            xf: (self.x & mask) as u32,
            yf: (self.y & mask) as u32,
        }
    }
}

/// Tile corners re-based onto the bounding-box origin for one plane.
///
/// Built once per tile and plane; everything downstream only sees small
/// plane-local values plus the integer [`origin`](Self::origin) to add back
/// when addressing the source plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslatedCorners {
    kind: PlaneKind,
    tile_size: u32,
    x: [i32; 4],
    y: [i32; 4],
    origin_x: i32,
    origin_y: i32,
}

impl TranslatedCorners {
    pub fn new(corners: &CornerSet, bbox: &BoundingBox, kind: PlaneKind, tile_size: u32) -> Self {
        let (origin_x, origin_y, shift_x, shift_y) = match kind {
            PlaneKind::Luma => {
                let ox = bbox.origin_x as i32;
                let oy = bbox.origin_y as i32;
                (ox, oy, ox << CORNER_Q, oy << CORNER_Q)
            }
            PlaneKind::Chroma => {
                let ox = (bbox.origin_x >> 1) as i32;
                let oy = (bbox.origin_y >> 1) as i32;
                let q = kind.frac_bits();
                // Centred siting: half a luma pixel on x as well as y
                (ox, oy, (ox << q) + CHROMA_PHASE_Q5, (oy << q) + CHROMA_PHASE_Q5)
            }
        };
        Self {
            kind,
            tile_size,
            x: corners.corners.map(|c| c.x as i32 - shift_x),
            y: corners.corners.map(|c| c.y as i32 - shift_y),
            origin_x,
            origin_y,
        }
    }

    pub fn kind(&self) -> PlaneKind {
        self.kind
    }

    /// Integer plane position that translated coordinates are relative to
    pub fn origin(&self) -> (i32, i32) {
        (self.origin_x, self.origin_y)
    }

    /// Output samples per tile side on this plane
    pub fn side(&self) -> usize {
        self.kind.samples_per_side(self.tile_size) as usize
    }

    /// Coordinate of output sample (`row`, `col`), computed from scratch.
    pub fn coordinate_at(&self, row: u32, col: u32) -> FixedCoord {
        let shift = self.kind.weight_shift(self.tile_size);
        let kc = self.kind.position(col);
        let kr = self.kind.position(row);

        let x0 = lerp_weighted(self.x[CornerSet::TOP_LEFT], self.x[CornerSet::TOP_RIGHT], kc, shift);
        let x1 = lerp_weighted(self.x[CornerSet::BOTTOM_LEFT], self.x[CornerSet::BOTTOM_RIGHT], kc, shift);
        let y0 = lerp_weighted(self.y[CornerSet::TOP_LEFT], self.y[CornerSet::TOP_RIGHT], kc, shift);
        let y1 = lerp_weighted(self.y[CornerSet::BOTTOM_LEFT], self.y[CornerSet::BOTTOM_RIGHT], kc, shift);

        FixedCoord {
            x: lerp_weighted(x0, x1, kr, shift),
            y: lerp_weighted(y0, y1, kr, shift),
        }
    }
}

/// `((N - k) * a + k * b + N / 2) >> log2(N)` with `N = 1 << shift`
#[inline(always)]
pub fn lerp_weighted(a: i32, b: i32, k: i32, shift: u32) -> i32 {
    let n = 1i32 << shift;
    ((n - k) * a + k * b + (n >> 1)) >> shift
}

/// Dense coordinate raster for one plane of one tile.
///
/// Edge values are computed once per column, then each row is a single
/// multiply-accumulate sweep over contiguous arrays.
#[derive(Debug, Clone)]
pub struct CoordinateRaster {
    side: usize,
    xs: Vec<i32>,
    ys: Vec<i32>,
    // Top/bottom edge values per column: x then y
    edges: [Vec<i32>; 4],
}

impl CoordinateRaster {
    pub fn new() -> Self {
        Self {
            side: 0,
            xs: Vec::new(),
            ys: Vec::new(),
            edges: Default::default(),
        }
    }

    /// Fill the raster for `corners`, reusing the existing allocation.
    pub fn build(&mut self, corners: &TranslatedCorners) {
        let kind = corners.kind;
        let side = corners.side();
        let shift = kind.weight_shift(corners.tile_size);
        let n = 1i32 << shift;
        let half = n >> 1;

        for edge in self.edges.iter_mut() {
            edge.resize(side, 0);
        }
        let [top_x, bottom_x, top_y, bottom_y] = &mut self.edges;
        for col in 0..side {
            let k = kind.position(col as u32);
            top_x[col] = lerp_weighted(corners.x[CornerSet::TOP_LEFT], corners.x[CornerSet::TOP_RIGHT], k, shift);
            bottom_x[col] = lerp_weighted(corners.x[CornerSet::BOTTOM_LEFT], corners.x[CornerSet::BOTTOM_RIGHT], k, shift);
            top_y[col] = lerp_weighted(corners.y[CornerSet::TOP_LEFT], corners.y[CornerSet::TOP_RIGHT], k, shift);
            bottom_y[col] = lerp_weighted(corners.y[CornerSet::BOTTOM_LEFT], corners.y[CornerSet::BOTTOM_RIGHT], k, shift);
        }

        self.side = side;
        self.xs.resize(side * side, 0);
        self.ys.resize(side * side, 0);

        for row in 0..side {
            let w1 = kind.position(row as u32);
            let w0 = n - w1;
            let xs = &mut self.xs[row * side..(row + 1) * side];
            let ys = &mut self.ys[row * side..(row + 1) * side];
            for col in 0..side {
                xs[col] = (w0 * top_x[col] + w1 * bottom_x[col] + half) >> shift;
                ys[col] = (w0 * top_y[col] + w1 * bottom_y[col] + half) >> shift;
            }
        }
    }

    pub fn side(&self) -> usize {
        self.side
    }

    /// X and Y coordinates of one output row
    #[inline]
    pub fn row(&self, row: usize) -> (&[i32], &[i32]) {
        let range = row * self.side..(row + 1) * self.side;
        (&self.xs[range.clone()], &self.ys[range])
    }

    pub fn get(&self, row: usize, col: usize) -> FixedCoord {
        let idx = row * self.side + col;
        FixedCoord::new(self.xs[idx], self.ys[idx])
    }
}

impl Default for CoordinateRaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coeffs::CornerPoint;

    fn square(x0: i16, y0: i16, size: i16) -> CornerSet {
        CornerSet::new(
            CornerPoint::new(x0, y0),
            CornerPoint::new(x0 + size, y0),
            CornerPoint::new(x0, y0 + size),
            CornerPoint::new(x0 + size, y0 + size),
        )
    }

    #[test]
    fn test_split() {
        let s = FixedCoord::new(37, 16).split(4);
        assert_eq!((s.xi, s.xf, s.yi, s.yf), (2, 5, 1, 0));

        let s = FixedCoord::new(-3, 95).split(5);
        assert_eq!((s.xi, s.xf, s.yi, s.yf), (-1, 29, 2, 31));
    }

    #[test]
    fn test_lerp_endpoints_and_rounding() {
        assert_eq!(lerp_weighted(100, 300, 0, 5), 100);
        assert_eq!(lerp_weighted(100, 300, 16, 5), 200);
        // 0.5 rounds up: (31 * 0 + 1 * 16 + 16) >> 5 = 1
        assert_eq!(lerp_weighted(0, 16, 1, 5), 1);
        assert_eq!(lerp_weighted(7, 7, 13, 5), 7);
    }

    #[test]
    fn test_luma_identity() {
        let bbox = BoundingBox::new(10, 20, 34, 34);
        let corners = square(10 * 16, 20 * 16, 32 * 16);
        let t = TranslatedCorners::new(&corners, &bbox, PlaneKind::Luma, 32);
        assert_eq!(t.origin(), (10, 20));
        for row in 0..32 {
            for col in 0..32 {
                let c = t.coordinate_at(row, col);
                assert_eq!(c, FixedCoord::new(col as i32 * 16, row as i32 * 16));
            }
        }
    }

    #[test]
    fn test_chroma_identity() {
        let bbox = BoundingBox::new(64, 32, 34, 34);
        let corners = square(64 * 16, 32 * 16, 32 * 16);
        let t = TranslatedCorners::new(&corners, &bbox, PlaneKind::Chroma, 32);
        assert_eq!(t.origin(), (32, 16));
        assert_eq!(t.side(), 16);
        for row in 0..16 {
            for col in 0..16 {
                let c = t.coordinate_at(row, col);
                assert_eq!(c, FixedCoord::new(col as i32 * 32, row as i32 * 32));
            }
        }
    }

    #[test]
    fn test_minified_tile_centre() {
        // 8x8 source pixels spread over a 32x32 output tile
        let corners = square(0, 0, 128);
        let bbox = BoundingBox::new(0, 0, 10, 10);
        let t = TranslatedCorners::new(&corners, &bbox, PlaneKind::Luma, 32);
        assert_eq!(t.coordinate_at(0, 0), FixedCoord::new(0, 0));
        assert_eq!(t.coordinate_at(16, 16), FixedCoord::new(64, 64));
        // 1/4 pixel per output pixel
        assert_eq!(t.coordinate_at(1, 3), FixedCoord::new(12, 4));
    }

    #[test]
    fn test_translation_is_monotonic() {
        let corners = square(200, 136, 512);
        let bbox = BoundingBox::new(12, 8, 36, 36);
        for kind in [PlaneKind::Luma, PlaneKind::Chroma] {
            let t = TranslatedCorners::new(&corners, &bbox, kind, 32);
            let side = t.side() as u32;
            for row in 0..side {
                for col in 1..side {
                    let a = t.coordinate_at(row, col - 1);
                    let b = t.coordinate_at(row, col);
                    assert!(b.x > a.x);
                    assert_eq!(b.y, a.y);
                }
            }
            for col in 0..side {
                for row in 1..side {
                    assert!(t.coordinate_at(row, col).y > t.coordinate_at(row - 1, col).y);
                }
            }
        }
    }

    #[test]
    fn test_raster_matches_per_pixel() {
        // A skewed, rotated and scaled quad
        let corners = CornerSet::new(
            CornerPoint::new(523, 311),
            CornerPoint::new(1071, 402),
            CornerPoint::new(457, 877),
            CornerPoint::new(1013, 941),
        );
        let bbox = BoundingBox::around(&corners, 200, 200);
        let mut raster = CoordinateRaster::new();
        for tile_size in [8, 16, 32, 64] {
            for kind in [PlaneKind::Luma, PlaneKind::Chroma] {
                let t = TranslatedCorners::new(&corners, &bbox, kind, tile_size);
                raster.build(&t);
                assert_eq!(raster.side(), t.side());
                for row in 0..t.side() {
                    for col in 0..t.side() {
                        assert_eq!(raster.get(row, col), t.coordinate_at(row as u32, col as u32));
                    }
                }
            }
        }
    }

    #[test]
    fn test_coordinates_stay_within_corner_hull() {
        let corners = CornerSet::new(
            CornerPoint::new(35, 70),
            CornerPoint::new(612, 3),
            CornerPoint::new(2, 590),
            CornerPoint::new(571, 640),
        );
        let bbox = BoundingBox::around(&corners, 64, 64);
        let t = TranslatedCorners::new(&corners, &bbox, PlaneKind::Luma, 32);
        let (min_x, min_y, max_x, max_y) = corners.extent();
        let ox = bbox.origin_x as i32 * 16;
        let oy = bbox.origin_y as i32 * 16;
        for row in 0..32 {
            for col in 0..32 {
                let c = t.coordinate_at(row, col);
                assert!(c.x + ox >= min_x && c.x + ox <= max_x);
                assert!(c.y + oy >= min_y && c.y + oy <= max_y);
            }
        }
    }
}
