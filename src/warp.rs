//! Frame-level tile driver
//!
//! Walks the coefficient table in raster order and hands each tile's source
//! frame and destination windows to a [`TileWarp`] implementation. Tiles
//! share nothing but the read-only source, so rows of tiles can be rendered
//! concurrently on disjoint destination bands.

use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coeffs::{check_frame, CoefficientTable, TileCoefficients};
use crate::error::{DewarpError, Result};
use crate::fast::FastWarp;
use crate::frame::{Nv12Frame, Nv12View};
use crate::reference::ReferenceWarp;
use crate::sampler::PlaneMut;

/// Renders one tile of both planes.
///
/// `dst_luma` / `dst_chroma` are windows onto the destination, at most
/// `tile_size` (luma) or `tile_size / 2` (chroma) samples per side. Smaller
/// windows occur on the frame's right and bottom edge and receive the
/// top-left part of the tile.
pub trait TileWarp: Sync {
    fn warp_tile(
        &self,
        tile: &TileCoefficients,
        tile_size: u32,
        src: &Nv12View<'_>,
        dst_luma: &mut PlaneMut<'_>,
        dst_chroma: &mut PlaneMut<'_>,
    );

    fn name(&self) -> &'static str;
}

/// Which [`TileWarp`] the driver uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Implementation {
    /// Per-pixel scalar oracle
    Reference,
    /// Row-oriented fast path
    #[default]
    Fast,
}

impl Implementation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Implementation::Reference => "reference",
            Implementation::Fast => "fast",
        }
    }

    pub fn warper(&self) -> &'static dyn TileWarp {
        match self {
            Implementation::Reference => &ReferenceWarp,
            Implementation::Fast => &FastWarp,
        }
    }
}

/// Applies a coefficient table to whole frames
#[derive(Debug, Clone)]
pub struct Dewarper {
    table: CoefficientTable,
    implementation: Implementation,
    parallel: bool,
}

impl Dewarper {
    pub fn new(table: CoefficientTable) -> Self {
        Self {
            table,
            implementation: Implementation::default(),
            parallel: true,
        }
    }

    pub fn with_implementation(mut self, implementation: Implementation) -> Self {
        self.implementation = implementation;
        self
    }

    /// Render rows of tiles on the rayon pool
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn implementation(&self) -> Implementation {
        self.implementation
    }

    /// Warp `src` into a newly allocated frame of the same size.
    pub fn warp(&self, src: &Nv12Frame) -> Result<Nv12Frame> {
        let mut dst = Nv12Frame::new(src.width(), src.height())?;
        self.warp_into(src, &mut dst)?;
        Ok(dst)
    }

    /// Warp `src` into `dst`; both frames must have the same dimensions.
    pub fn warp_into(&self, src: &Nv12Frame, dst: &mut Nv12Frame) -> Result<()> {
        if (src.width(), src.height()) != (dst.width(), dst.height()) {
            return Err(DewarpError::InvalidDimensions {
                width: dst.width(),
                height: dst.height(),
            });
        }
        let (luma, chroma) = dst.planes_mut();
        self.warp_planes(&src.view(), luma, chroma)
    }

    /// Warp into caller-owned destination planes.
    pub fn warp_planes(&self, src: &Nv12View<'_>, dst_luma: PlaneMut<'_>, dst_chroma: PlaneMut<'_>) -> Result<()> {
        let (width, height) = (src.width(), src.height());
        check_frame(width, height)?;
        self.table.check_covers(width, height)?;
        if dst_luma.width() != width as usize
            || dst_luma.height() != height as usize
            || dst_chroma.width() * 2 != width as usize
            || dst_chroma.height() * 2 != height as usize
        {
            return Err(DewarpError::InvalidDimensions { width, height });
        }

        let started = Instant::now();
        let tile_size = self.table.tile_size() as usize;
        let warper = self.implementation.warper();

        let bands: Vec<_> = dst_luma
            .into_bands(tile_size)
            .into_iter()
            .zip(dst_chroma.into_bands(tile_size / 2))
            .enumerate()
            .collect();

        if self.parallel {
            bands
                .into_par_iter()
                .for_each(|(row, (mut luma, mut chroma))| self.warp_band(warper, row as u32, src, &mut luma, &mut chroma));
        } else {
            for (row, (mut luma, mut chroma)) in bands {
                self.warp_band(warper, row as u32, src, &mut luma, &mut chroma);
            }
        }

        debug!(
            "Warped {}x{} frame ({} tiles, {}, parallel={}) in {:?}",
            width,
            height,
            self.table.tiles().len(),
            warper.name(),
            self.parallel,
            started.elapsed()
        );
        Ok(())
    }

    /// Render one row of tiles into its destination bands.
    fn warp_band(
        &self,
        warper: &dyn TileWarp,
        row: u32,
        src: &Nv12View<'_>,
        luma: &mut PlaneMut<'_>,
        chroma: &mut PlaneMut<'_>,
    ) {
        let tile_size = self.table.tile_size() as usize;
        let half = tile_size / 2;
        for (col, tile) in self.table.row(row).iter().enumerate() {
            let mut luma_tile = luma.window_mut(col * tile_size, 0, tile_size, tile_size);
            let mut chroma_tile = chroma.window_mut(col * half, 0, half, half);
            warper.warp_tile(tile, tile_size as u32, src, &mut luma_tile, &mut chroma_tile);
        }
    }
}
