//! Error types for the dewarp library

use thiserror::Error;

/// Errors raised while validating frames, tables and configuration.
///
/// The per-pixel core never fails; everything here is geometry that the
/// driver checks before the first tile is touched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DewarpError {
    #[error("tile size {0} must be a power of two between 4 and 128")]
    InvalidTileSize(u32),

    #[error("frame dimensions {width}x{height} must be even and non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("frame {width}x{height} exceeds the Q4 coordinate range (max {max} pixels per side)")]
    FrameTooLarge { width: u32, height: u32, max: u32 },

    #[error("grid vertex ({col}, {row}) maps outside the Q4 corner range")]
    CornerOutOfRange { col: u32, row: u32 },

    #[error("coefficient table holds {actual} bytes, expected {expected}")]
    TableSize { expected: usize, actual: usize },

    #[error("coefficient table grid {table_cols}x{table_rows} does not cover a {frame_width}x{frame_height} frame with {tile_size}px tiles")]
    TableGeometry {
        table_cols: u32,
        table_rows: u32,
        tile_size: u32,
        frame_width: u32,
        frame_height: u32,
    },

    #[error("{plane} plane buffer too small: need {needed} bytes, have {actual}")]
    PlaneTooSmall {
        plane: &'static str,
        needed: usize,
        actual: usize,
    },

    #[error("stride {stride} is smaller than row width {row_bytes}")]
    InvalidStride { stride: usize, row_bytes: usize },
}

pub type Result<T> = std::result::Result<T, DewarpError>;
