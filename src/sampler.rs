//! Plane views and 2x2 bilinear reconstruction
//!
//! A sample is reconstructed from its four integer neighbours by a
//! horizontal then a vertical fixed-point blend, each rounding half up.
//! Coordinates whose 2x2 neighbourhood is not fully inside the plane produce
//! the plane's sentinel instead of a read.

use crate::error::{DewarpError, Result};
use crate::interpolate::{FixedCoord, PlaneKind};

fn check_geometry(
    plane: &'static str,
    len: usize,
    width: usize,
    height: usize,
    stride: usize,
    components: usize,
) -> Result<()> {
    let row_bytes = width * components;
    if stride < row_bytes {
        return Err(DewarpError::InvalidStride { stride, row_bytes });
    }
    let needed = if height == 0 {
        0
    } else {
        (height - 1) * stride + row_bytes
    };
    if len < needed {
        return Err(DewarpError::PlaneTooSmall {
            plane,
            needed,
            actual: len,
        });
    }
    Ok(())
}

fn plane_name(kind: PlaneKind) -> &'static str {
    match kind {
        PlaneKind::Luma => "luma",
        PlaneKind::Chroma => "chroma",
    }
}

/// Read-only view of one 8-bit plane.
///
/// `width` counts samples; a chroma sample is two interleaved bytes.
/// `stride` is in bytes and may include padding.
#[derive(Debug, Clone, Copy)]
pub struct Plane<'a> {
    data: &'a [u8],
    width: usize,
    height: usize,
    stride: usize,
    kind: PlaneKind,
}

impl<'a> Plane<'a> {
    pub fn new(data: &'a [u8], width: usize, height: usize, stride: usize, kind: PlaneKind) -> Result<Self> {
        check_geometry(plane_name(kind), data.len(), width, height, stride, kind.components())?;
        Ok(Self {
            data,
            width,
            height,
            stride,
            kind,
        })
    }

    /// Geometry already validated by the owner of `data`
    pub(crate) fn from_parts(data: &'a [u8], width: usize, height: usize, stride: usize, kind: PlaneKind) -> Self {
        debug_assert!(check_geometry(plane_name(kind), data.len(), width, height, stride, kind.components()).is_ok());
        Self {
            data,
            width,
            height,
            stride,
            kind,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn kind(&self) -> PlaneKind {
        self.kind
    }

    pub(crate) fn data(&self) -> &'a [u8] {
        self.data
    }

    /// True when the 2x2 neighbourhood anchored at (`x`, `y`) lies inside the plane.
    #[inline(always)]
    pub fn has_neighbourhood(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as i64) + 1 < self.width as i64 && (y as i64) + 1 < self.height as i64
    }

    /// Blend the 2x2 neighbourhood at (`x`, `y`) into `out`, one byte per
    /// component. The neighbourhood must be inside the plane.
    #[inline(always)]
    pub fn blend(&self, x: usize, y: usize, xf: u32, yf: u32, out: &mut [u8]) {
        let q = self.kind.frac_bits();
        let c = self.kind.components();
        let top = y * self.stride + x * c;
        let bottom = top + self.stride;
        for (ch, dst) in out.iter_mut().enumerate().take(c) {
            let r0 = lerp_q(self.data[top + ch] as u32, self.data[top + c + ch] as u32, xf, q);
            let r1 = lerp_q(self.data[bottom + ch] as u32, self.data[bottom + c + ch] as u32, xf, q);
            *dst = lerp_q(r0, r1, yf, q) as u8;
        }
    }
}

/// Writable view of one 8-bit plane, or of a rectangle inside one
#[derive(Debug)]
pub struct PlaneMut<'a> {
    data: &'a mut [u8],
    width: usize,
    height: usize,
    stride: usize,
    kind: PlaneKind,
}

impl<'a> PlaneMut<'a> {
    pub fn new(data: &'a mut [u8], width: usize, height: usize, stride: usize, kind: PlaneKind) -> Result<Self> {
        check_geometry(plane_name(kind), data.len(), width, height, stride, kind.components())?;
        Ok(Self {
            data,
            width,
            height,
            stride,
            kind,
        })
    }

    /// Geometry already validated by the owner of `data`
    pub(crate) fn from_parts(data: &'a mut [u8], width: usize, height: usize, stride: usize, kind: PlaneKind) -> Self {
        debug_assert!(check_geometry(plane_name(kind), data.len(), width, height, stride, kind.components()).is_ok());
        Self {
            data,
            width,
            height,
            stride,
            kind,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn kind(&self) -> PlaneKind {
        self.kind
    }

    /// Mutable bytes of row `y`, without padding
    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let start = y * self.stride;
        let len = self.width * self.kind.components();
        &mut self.data[start..start + len]
    }

    /// Sub-view of `width` x `height` samples starting at (`x`, `y`),
    /// clipped to this view.
    pub fn window_mut(&mut self, x: usize, y: usize, width: usize, height: usize) -> PlaneMut<'_> {
        let x = x.min(self.width);
        let y = y.min(self.height);
        let width = width.min(self.width - x);
        let height = height.min(self.height - y);
        let start = if width == 0 || height == 0 {
            0
        } else {
            y * self.stride + x * self.kind.components()
        };
        PlaneMut {
            data: &mut self.data[start..],
            width,
            height,
            stride: self.stride,
            kind: self.kind,
        }
    }

    /// Split into consecutive horizontal bands of `band_height` rows (the
    /// last one may be shorter). Bands borrow disjoint memory and can be
    /// written from different threads.
    pub fn into_bands(self, band_height: usize) -> Vec<PlaneMut<'a>> {
        let band_height = band_height.max(1);
        let mut bands = Vec::with_capacity(self.height.div_ceil(band_height));
        let mut rest = self.data;
        let mut y = 0;
        while y < self.height {
            let height = band_height.min(self.height - y);
            let take = (height * self.stride).min(rest.len());
            let (band, tail) = std::mem::take(&mut rest).split_at_mut(take);
            bands.push(PlaneMut {
                data: band,
                width: self.width,
                height,
                stride: self.stride,
                kind: self.kind,
            });
            rest = tail;
            y += height;
        }
        bands
    }
}

/// `((2^q - frac) * a + frac * b + 2^(q-1)) >> q`
#[inline(always)]
pub fn lerp_q(a: u32, b: u32, frac: u32, q: u32) -> u32 {
    (((1 << q) - frac) * a + frac * b + (1 << (q - 1))) >> q
}

/// Reconstruct one output sample.
///
/// `coord` is relative to the integer plane position `origin` (the
/// translated bounding-box origin). Positions whose neighbourhood falls
/// outside `src` are filled with the plane's sentinel.
#[inline]
pub fn sample(src: &Plane<'_>, origin: (i32, i32), coord: FixedCoord, out: &mut [u8]) {
    let s = coord.split(src.kind.frac_bits());
    let x = origin.0 + s.xi;
    let y = origin.1 + s.yi;
    if !src.has_neighbourhood(x, y) {
        out.fill(src.kind.sentinel());
        return;
    }
    src.blend(x as usize, y as usize, s.xf, s.yf, out);
}
