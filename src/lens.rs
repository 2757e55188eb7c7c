//! Radial lens model for generating coefficient tables
//!
//! Real deployments receive tables from a calibration tool. This simple
//! two-term radial model covers the common barrel/pincushion case and is
//! what the CLI uses when no table file is given.

use serde::{Deserialize, Serialize};

use crate::coeffs::CoefficientTable;
use crate::error::Result;

/// Radial distortion: `src = centre + d * (1 + k1 r^2 + k2 r^4) / zoom`,
/// with `r` normalised so the half-diagonal is 1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RadialLens {
    /// Second-order coefficient (negative = barrel correction)
    #[serde(default)]
    pub k1: f64,
    /// Fourth-order coefficient
    #[serde(default)]
    pub k2: f64,
    /// Output magnification; values above 1 crop the borders
    #[serde(default = "default_zoom")]
    pub zoom: f64,
}

fn default_zoom() -> f64 {
    1.0
}

impl Default for RadialLens {
    fn default() -> Self {
        Self {
            k1: -0.08,
            k2: 0.0,
            zoom: 1.0,
        }
    }
}

impl RadialLens {
    /// The identity lens
    pub fn none() -> Self {
        Self {
            k1: 0.0,
            k2: 0.0,
            zoom: 1.0,
        }
    }

    /// Map an output pixel position to a source pixel position.
    pub fn source_position(&self, width: u32, height: u32, x: f64, y: f64) -> (f64, f64) {
        let cx = width as f64 / 2.0;
        let cy = height as f64 / 2.0;
        let norm = (cx * cx + cy * cy).sqrt();
        let dx = (x - cx) / norm;
        let dy = (y - cy) / norm;
        let r2 = dx * dx + dy * dy;
        let zoom = if self.zoom > 0.0 { self.zoom } else { 1.0 };
        let scale = (1.0 + self.k1 * r2 + self.k2 * r2 * r2) / zoom;
        (cx + (x - cx) * scale, cy + (y - cy) * scale)
    }

    /// Coefficient table for a `width` x `height` frame.
    pub fn table(&self, width: u32, height: u32, tile_size: u32) -> Result<CoefficientTable> {
        CoefficientTable::from_mapping(width, height, tile_size, |x, y| {
            self.source_position(width, height, x, y)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coeffs::CornerSet;

    #[test]
    fn test_no_distortion_is_identity() {
        let table = RadialLens::none().table(128, 96, 32).unwrap();
        assert_eq!(table, CoefficientTable::identity(128, 96, 32).unwrap());
    }

    #[test]
    fn test_centre_is_fixed() {
        let lens = RadialLens {
            k1: -0.3,
            k2: 0.1,
            zoom: 1.2,
        };
        assert_eq!(lens.source_position(640, 480, 320.0, 240.0), (320.0, 240.0));
    }

    #[test]
    fn test_barrel_pulls_corners_inward() {
        let lens = RadialLens {
            k1: -0.2,
            k2: 0.0,
            zoom: 1.0,
        };
        let (x, y) = lens.source_position(640, 480, 0.0, 0.0);
        // r = 1 at the corner, scale = 0.8
        assert!((x - 64.0).abs() < 1e-9);
        assert!((y - 48.0).abs() < 1e-9);

        let table = lens.table(640, 480, 32).unwrap();
        let tl = table.tile(0, 0).corners.corners[CornerSet::TOP_LEFT];
        assert_eq!((tl.x, tl.y), (64 * 16, 48 * 16));
        // Bottom-left vertex (0, 32) lands left of the frame corner
        assert_eq!(table.tile(0, 0).bbox.origin_x, 58);
    }
}
