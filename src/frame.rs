//! NV12 frame buffers
//!
//! A frame is a full-resolution luma plane followed by a half-resolution
//! chroma plane of interleaved U/V pairs (4:2:0). Both planes carry their
//! own stride so padded buffers from capture hardware can be used directly.

use crate::error::{DewarpError, Result};
use crate::interpolate::PlaneKind;
use crate::sampler::{Plane, PlaneMut};

/// Borrowed luma + chroma planes of one frame
#[derive(Debug, Clone, Copy)]
pub struct Nv12View<'a> {
    pub luma: Plane<'a>,
    pub chroma: Plane<'a>,
}

impl<'a> Nv12View<'a> {
    /// Pair two planes, checking the chroma plane is exactly half size.
    pub fn new(luma: Plane<'a>, chroma: Plane<'a>) -> Result<Self> {
        if chroma.width() * 2 != luma.width() || chroma.height() * 2 != luma.height() {
            return Err(DewarpError::InvalidDimensions {
                width: luma.width() as u32,
                height: luma.height() as u32,
            });
        }
        Ok(Self { luma, chroma })
    }

    pub fn width(&self) -> u32 {
        self.luma.width() as u32
    }

    pub fn height(&self) -> u32 {
        self.luma.height() as u32
    }
}

/// Owned NV12 frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nv12Frame {
    width: u32,
    height: u32,
    luma_stride: usize,
    chroma_stride: usize,
    luma: Vec<u8>,
    chroma: Vec<u8>,
}

impl Nv12Frame {
    /// Black frame with tightly packed rows
    pub fn new(width: u32, height: u32) -> Result<Self> {
        Self::with_strides(width, height, width as usize, width as usize)
    }

    /// Black frame with explicit row strides (in bytes)
    pub fn with_strides(width: u32, height: u32, luma_stride: usize, chroma_stride: usize) -> Result<Self> {
        check_even(width, height)?;
        for stride in [luma_stride, chroma_stride] {
            if stride < width as usize {
                return Err(DewarpError::InvalidStride {
                    stride,
                    row_bytes: width as usize,
                });
            }
        }
        let chroma_rows = (height / 2) as usize;
        Ok(Self {
            width,
            height,
            luma_stride,
            chroma_stride,
            luma: vec![0; luma_stride * height as usize],
            chroma: vec![PlaneKind::Chroma.sentinel(); chroma_stride * chroma_rows],
        })
    }

    /// Parse a tightly packed NV12 buffer (`w*h` luma bytes then `w*h/2` chroma bytes).
    pub fn from_raw(width: u32, height: u32, raw: &[u8]) -> Result<Self> {
        check_even(width, height)?;
        let sizes = width
            .checked_mul(height)
            .and_then(|n| usize::try_from(n).ok())
            .and_then(|n| Some((n, n.checked_add(n / 2)?)));
        let Some((luma_len, expected)) = sizes else {
            return Err(DewarpError::InvalidDimensions { width, height });
        };
        if raw.len() != expected {
            return Err(DewarpError::PlaneTooSmall {
                plane: "nv12",
                needed: expected,
                actual: raw.len(),
            });
        }
        Ok(Self {
            width,
            height,
            luma_stride: width as usize,
            chroma_stride: width as usize,
            luma: raw[..luma_len].to_vec(),
            chroma: raw[luma_len..].to_vec(),
        })
    }

    /// Tightly packed NV12 bytes, padding removed
    pub fn to_raw(&self) -> Vec<u8> {
        let w = self.width as usize;
        let mut out = Vec::with_capacity(w * self.height as usize * 3 / 2);
        for row in self.luma.chunks(self.luma_stride).take(self.height as usize) {
            out.extend_from_slice(&row[..w]);
        }
        for row in self.chroma.chunks(self.chroma_stride).take((self.height / 2) as usize) {
            out.extend_from_slice(&row[..w]);
        }
        out
    }

    /// Deterministic frame with gradients, edges and noise on both planes.
    pub fn test_pattern(width: u32, height: u32) -> Result<Self> {
        let mut frame = Self::new(width, height)?;
        let mut seed = 0x9E37_79B9u32 ^ width.wrapping_mul(31) ^ height;
        let mut noise = move || {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            seed
        };
        let w = width as usize;
        for y in 0..height as usize {
            for x in 0..w {
                let checker = if (x / 8 + y / 8) % 2 == 0 { 40 } else { 0 };
                let ramp = (x * 160 / w.max(1)) as u32;
                frame.luma[y * w + x] = (ramp + checker + (noise() & 0x3F)).min(255) as u8;
            }
        }
        for y in 0..(height / 2) as usize {
            for x in 0..w / 2 {
                frame.chroma[y * w + 2 * x] = (64 + (x * 3 + y) % 128) as u8;
                frame.chroma[y * w + 2 * x + 1] = (255 - (y * 5 % 200) as u32 - (noise() & 0x1F)) as u8;
            }
        }
        Ok(frame)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn luma_stride(&self) -> usize {
        self.luma_stride
    }

    pub fn chroma_stride(&self) -> usize {
        self.chroma_stride
    }

    pub fn luma(&self) -> &[u8] {
        &self.luma
    }

    pub fn chroma(&self) -> &[u8] {
        &self.chroma
    }

    pub fn luma_mut(&mut self) -> &mut [u8] {
        &mut self.luma
    }

    pub fn chroma_mut(&mut self) -> &mut [u8] {
        &mut self.chroma
    }

    pub fn view(&self) -> Nv12View<'_> {
        let w = self.width as usize;
        let h = self.height as usize;
        Nv12View {
            luma: Plane::from_parts(&self.luma, w, h, self.luma_stride, PlaneKind::Luma),
            chroma: Plane::from_parts(&self.chroma, w / 2, h / 2, self.chroma_stride, PlaneKind::Chroma),
        }
    }

    /// Writable luma and chroma planes
    pub fn planes_mut(&mut self) -> (PlaneMut<'_>, PlaneMut<'_>) {
        let w = self.width as usize;
        let h = self.height as usize;
        (
            PlaneMut::from_parts(&mut self.luma, w, h, self.luma_stride, PlaneKind::Luma),
            PlaneMut::from_parts(&mut self.chroma, w / 2, h / 2, self.chroma_stride, PlaneKind::Chroma),
        )
    }

    /// Luma sample at (`x`, `y`)
    pub fn luma_at(&self, x: usize, y: usize) -> u8 {
        self.luma[y * self.luma_stride + x]
    }

    /// U/V pair of chroma sample (`x`, `y`)
    pub fn chroma_at(&self, x: usize, y: usize) -> [u8; 2] {
        let i = y * self.chroma_stride + 2 * x;
        [self.chroma[i], self.chroma[i + 1]]
    }
}

fn check_even(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
        return Err(DewarpError::InvalidDimensions { width, height });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_layout() {
        let raw: Vec<u8> = (0..24).collect();
        let frame = Nv12Frame::from_raw(4, 4, &raw).unwrap();
        assert_eq!(frame.luma_at(1, 2), 9);
        assert_eq!(frame.chroma_at(1, 1), [22, 23]);
        assert_eq!(frame.to_raw(), raw);
    }

    #[test]
    fn test_raw_size_mismatch() {
        assert!(Nv12Frame::from_raw(4, 4, &[0u8; 20]).is_err());
        assert!(Nv12Frame::from_raw(3, 4, &[0u8; 18]).is_err());
    }

    #[test]
    fn test_raw_size_overflow() {
        assert_eq!(
            Nv12Frame::from_raw(65536, 65536, &[]),
            Err(DewarpError::InvalidDimensions {
                width: 65536,
                height: 65536
            })
        );
    }

    #[test]
    fn test_padded_strides() {
        let mut frame = Nv12Frame::with_strides(6, 4, 8, 10).unwrap();
        assert_eq!(frame.luma().len(), 32);
        assert_eq!(frame.chroma().len(), 20);
        {
            let (mut luma, mut chroma) = frame.planes_mut();
            luma.row_mut(3).copy_from_slice(&[1, 2, 3, 4, 5, 6]);
            chroma.row_mut(1).copy_from_slice(&[7, 8, 9, 10, 11, 12]);
        }
        assert_eq!(frame.luma_at(5, 3), 6);
        assert_eq!(frame.chroma_at(2, 1), [11, 12]);
        let raw = frame.to_raw();
        assert_eq!(raw.len(), 36);
        assert_eq!(&raw[18..24], &[1, 2, 3, 4, 5, 6]);
        assert_eq!(&raw[30..36], &[7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn test_view_dimensions() {
        let frame = Nv12Frame::test_pattern(64, 48).unwrap();
        let view = frame.view();
        assert_eq!((view.width(), view.height()), (64, 48));
        assert_eq!((view.chroma.width(), view.chroma.height()), (32, 24));
        assert!(Nv12View::new(view.luma, view.luma).is_err());
    }

    #[test]
    fn test_pattern_is_deterministic() {
        let a = Nv12Frame::test_pattern(32, 32).unwrap();
        let b = Nv12Frame::test_pattern(32, 32).unwrap();
        assert_eq!(a, b);
        assert!(a.luma().iter().any(|&v| v != a.luma()[0]));
    }
}
