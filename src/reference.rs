//! Scalar reference warp
//!
//! Straight-line per-pixel rendition of the tile warp: every output sample
//! recomputes its coordinate from the four corners and is reconstructed
//! through the checked sampler. Slow, but each step maps one-to-one onto the
//! fixed-point formulas, which makes it the oracle the fast path is held to.

use crate::coeffs::TileCoefficients;
use crate::frame::Nv12View;
use crate::interpolate::{PlaneKind, TranslatedCorners};
use crate::sampler::{sample, Plane, PlaneMut};
use crate::warp::TileWarp;

/// Per-pixel reference implementation of [`TileWarp`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceWarp;

impl TileWarp for ReferenceWarp {
    fn warp_tile(
        &self,
        tile: &TileCoefficients,
        tile_size: u32,
        src: &Nv12View<'_>,
        dst_luma: &mut PlaneMut<'_>,
        dst_chroma: &mut PlaneMut<'_>,
    ) {
        warp_plane(tile, tile_size, &src.luma, dst_luma);
        warp_plane(tile, tile_size, &src.chroma, dst_chroma);
    }

    fn name(&self) -> &'static str {
        "reference"
    }
}

fn warp_plane(tile: &TileCoefficients, tile_size: u32, src: &Plane<'_>, dst: &mut PlaneMut<'_>) {
    let kind = src.kind();
    let corners = TranslatedCorners::new(&tile.corners, &tile.bbox, kind, tile_size);
    let origin = corners.origin();
    let components = kind.components();
    let side = corners.side();

    for row in 0..dst.height().min(side) {
        let out = dst.row_mut(row);
        for (col, px) in out.chunks_exact_mut(components).take(side).enumerate() {
            let coord = corners.coordinate_at(row as u32, col as u32);
            if kind == PlaneKind::Luma {
                debug_assert_in_bbox(tile, src, origin, coord.x, coord.y);
            }
            sample(src, origin, coord, px);
        }
    }
}

/// Samples that land inside the source frame must also land inside the
/// tile's declared bounding box, right/bottom neighbour included.
#[inline]
fn debug_assert_in_bbox(tile: &TileCoefficients, src: &Plane<'_>, origin: (i32, i32), x: i32, y: i32) {
    if cfg!(debug_assertions) {
        let q = PlaneKind::Luma.frac_bits();
        let (xi, yi) = (x >> q, y >> q);
        if src.has_neighbourhood(origin.0 + xi, origin.1 + yi) {
            debug_assert!(
                xi >= 0 && yi >= 0 && xi + 1 < tile.bbox.width as i32 && yi + 1 < tile.bbox.height as i32,
                "sample ({}, {}) outside bounding box {:?}",
                xi,
                yi,
                tile.bbox
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coeffs::{BoundingBox, CornerPoint, CornerSet};
    use crate::frame::Nv12Frame;

    fn square_tile(x0: i16, y0: i16, size: i16, bbox: BoundingBox) -> TileCoefficients {
        TileCoefficients {
            corners: CornerSet::new(
                CornerPoint::new(x0, y0),
                CornerPoint::new(x0 + size, y0),
                CornerPoint::new(x0, y0 + size),
                CornerPoint::new(x0 + size, y0 + size),
            ),
            bbox,
        }
    }

    fn run(tile: &TileCoefficients, src: &Nv12Frame) -> Nv12Frame {
        let mut dst = Nv12Frame::new(32, 32).unwrap();
        {
            let (mut luma, mut chroma) = dst.planes_mut();
            ReferenceWarp.warp_tile(tile, 32, &src.view(), &mut luma, &mut chroma);
        }
        dst
    }

    #[test]
    fn test_identity_tile() {
        let src = Nv12Frame::test_pattern(96, 96).unwrap();
        let tile = square_tile(20 * 16, 36 * 16, 32 * 16, BoundingBox::new(20, 36, 34, 34));
        let dst = run(&tile, &src);
        for y in 0..32 {
            for x in 0..32 {
                assert_eq!(dst.luma_at(x, y), src.luma_at(20 + x, 36 + y));
            }
        }
        for y in 0..16 {
            for x in 0..16 {
                assert_eq!(dst.chroma_at(x, y), src.chroma_at(10 + x, 18 + y));
            }
        }
    }

    #[test]
    fn test_minified_tile() {
        let src = Nv12Frame::test_pattern(64, 64).unwrap();
        let tile = square_tile(0, 0, 128, BoundingBox::new(0, 0, 10, 10));
        let dst = run(&tile, &src);
        assert_eq!(dst.luma_at(0, 0), src.luma_at(0, 0));
        assert_eq!(dst.luma_at(16, 16), src.luma_at(4, 4));
        assert_eq!(dst.luma_at(8, 4), src.luma_at(2, 1));
    }

    #[test]
    fn test_tile_off_frame_uses_sentinels() {
        let src = Nv12Frame::test_pattern(64, 64).unwrap();
        // Entire tile maps left of and above the frame
        let tile = square_tile(-60 * 16, -60 * 16, 32 * 16, BoundingBox::new(0, 0, 0, 0));
        let dst = run(&tile, &src);
        assert!(dst.luma().iter().all(|&v| v == 0));
        assert!(dst.chroma().iter().all(|&v| v == 128));
    }

    #[test]
    fn test_tile_straddling_right_edge() {
        let src = Nv12Frame::test_pattern(64, 64).unwrap();
        let tile = square_tile(48 * 16, 0, 32 * 16, BoundingBox::new(48, 0, 16, 34));
        let dst = run(&tile, &src);
        for y in 0..32 {
            for x in 0..15 {
                assert_eq!(dst.luma_at(x, y), src.luma_at(48 + x, y));
            }
            // Column 63 has no right neighbour
            for x in 15..32 {
                assert_eq!(dst.luma_at(x, y), 0);
            }
        }
    }

    /// All four corners on one point between pixels (40.5, 40.5)
    fn collapsed_tile(bbox: BoundingBox) -> TileCoefficients {
        let p = CornerPoint::new(648, 648);
        TileCoefficients {
            corners: CornerSet::new(p, p, p, p),
            bbox,
        }
    }

    #[test]
    fn test_bbox_margin_is_enough() {
        let src = Nv12Frame::test_pattern(64, 64).unwrap();
        let corners = collapsed_tile(BoundingBox::default()).corners;
        let tile = collapsed_tile(BoundingBox::around(&corners, 64, 64));
        assert_eq!(tile.bbox, BoundingBox::new(40, 40, 2, 2));
        let dst = run(&tile, &src);
        let expected = (src.luma_at(40, 40) as u32
            + src.luma_at(41, 40) as u32
            + src.luma_at(40, 41) as u32
            + src.luma_at(41, 41) as u32) as f64
            / 4.0;
        assert!((dst.luma_at(0, 0) as f64 - expected).abs() <= 1.0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "outside bounding box")]
    fn test_bbox_one_pixel_short() {
        let src = Nv12Frame::test_pattern(64, 64).unwrap();
        // Right neighbour at x = 41 is not covered
        run(&collapsed_tile(BoundingBox::new(40, 40, 1, 2)), &src);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "outside bounding box")]
    fn test_bbox_origin_past_samples() {
        let src = Nv12Frame::test_pattern(64, 64).unwrap();
        run(&collapsed_tile(BoundingBox::new(41, 40, 4, 4)), &src);
    }

    #[test]
    fn test_deterministic() {
        let src = Nv12Frame::test_pattern(64, 64).unwrap();
        let tile = TileCoefficients {
            corners: CornerSet::new(
                CornerPoint::new(37, 52),
                CornerPoint::new(501, 18),
                CornerPoint::new(12, 560),
                CornerPoint::new(533, 577),
            ),
            bbox: BoundingBox::new(0, 1, 36, 37),
        };
        assert_eq!(run(&tile, &src), run(&tile, &src));
    }
}
