//! tiledewarp - fixed-point tile-based lens distortion correction
//!
//! A destination NV12 frame is cut into square tiles. Each tile carries the
//! four source-image positions of its corners (Q4 fixed point) and a
//! bounding box of the source pixels it may read. Output pixels are placed
//! by bilinear interpolation between the corners and reconstructed by
//! bilinear sampling of the source, luma in Q4 and interleaved chroma in Q5.
//!
//! Two implementations produce identical bytes: [`ReferenceWarp`], a
//! per-pixel oracle, and [`FastWarp`], a row-oriented version used by
//! default. [`verify::cross_check`] compares them on a whole frame.

pub mod coeffs;
pub mod color;
pub mod config;
pub mod error;
pub mod fast;
pub mod frame;
pub mod interpolate;
pub mod lens;
pub mod reference;
pub mod sampler;
pub mod verify;
pub mod warp;

pub use coeffs::{BoundingBox, CoefficientTable, CornerPoint, CornerSet, TileCoefficients};
pub use error::{DewarpError, Result};
pub use fast::FastWarp;
pub use frame::{Nv12Frame, Nv12View};
pub use lens::RadialLens;
pub use reference::ReferenceWarp;
pub use warp::{Dewarper, Implementation, TileWarp};
