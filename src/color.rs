//! RGB <-> NV12 conversion
//!
//! Decoded images arrive as packed RGB and have to be brought into 4:2:0
//! YCbCr before warping, then back again for writing. Two things decide
//! the mapping:
//! - the color matrix (BT.601, BT.709 or BT.2020)
//! - the quantization range (full 0-255 or limited 16-235/16-240)
//!
//! All per-pixel math is integer with coefficients scaled by 256.

use serde::{Deserialize, Serialize};

use crate::error::{DewarpError, Result};
use crate::frame::Nv12Frame;

/// Color space standard for YCbCr <-> RGB conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    /// BT.601 - Standard Definition, also JPEG
    #[default]
    Bt601,
    /// BT.709 - High Definition
    Bt709,
    /// BT.2020 - Ultra High Definition (matrix only, no HDR transfer)
    Bt2020,
}

impl ColorSpace {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorSpace::Bt601 => "BT.601 (SD)",
            ColorSpace::Bt709 => "BT.709 (HD)",
            ColorSpace::Bt2020 => "BT.2020 (UHD)",
        }
    }
}

/// Quantization range of the YCbCr codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuantizationRange {
    /// Y 16-235, CbCr 16-240
    Limited,
    /// Y 0-255, CbCr 0-255
    #[default]
    Full,
}

impl QuantizationRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuantizationRange::Limited => "Limited (16-235)",
            QuantizationRange::Full => "Full (0-255)",
        }
    }

    /// `(luma offset, luma scale, chroma scale)` for expanding codes to full range, scaled by 256.
    fn expansion(&self) -> (i32, i32, i32) {
        match self {
            // (Y - 16) * 255 / 219 ~ (Y - 16) * 298 / 256
            // (C - 128) * 255 / 224 ~ (C - 128) * 291 / 256
            QuantizationRange::Limited => (16, 298, 291),
            QuantizationRange::Full => (0, 256, 256),
        }
    }

    /// `(luma offset, luma scale, chroma scale)` for compressing full range into codes, scaled by 256.
    fn compression(&self) -> (i32, i32, i32) {
        match self {
            // Y * 219 / 255 ~ Y * 220 / 256, C * 224 / 255 ~ C * 225 / 256
            QuantizationRange::Limited => (16, 220, 225),
            QuantizationRange::Full => (0, 256, 256),
        }
    }
}

/// Color conversion coefficients for one standard
#[derive(Debug, Clone, Copy)]
pub struct ColorMatrix {
    /// Red weight in luma
    pub luma_r: f32,
    /// Blue weight in luma
    pub luma_b: f32,
}

impl ColorMatrix {
    pub const BT601: Self = Self {
        luma_r: 0.299,
        luma_b: 0.114,
    };

    pub const BT709: Self = Self {
        luma_r: 0.2126,
        luma_b: 0.0722,
    };

    pub const BT2020: Self = Self {
        luma_r: 0.2627,
        luma_b: 0.0593,
    };

    pub fn from_color_space(cs: ColorSpace) -> Self {
        match cs {
            ColorSpace::Bt601 => Self::BT601,
            ColorSpace::Bt709 => Self::BT709,
            ColorSpace::Bt2020 => Self::BT2020,
        }
    }

    /// Convert to fixed-point integer coefficients (scaled by 256)
    pub fn to_fixed_point(&self) -> FixedPointMatrix {
        let kr = self.luma_r;
        let kb = self.luma_b;
        let kg = 1.0 - kr - kb;
        let cr_span = 2.0 * (1.0 - kr);
        let cb_span = 2.0 * (1.0 - kb);
        let fix = |v: f32| (v * 256.0).round() as i32;

        let y_r = fix(kr);
        let y_b = fix(kb);
        FixedPointMatrix {
            y_r,
            // Weights sum to exactly 256 so greys stay grey
            y_g: 256 - y_r - y_b,
            y_b,
            cb: fix(1.0 / cb_span),
            cr: fix(1.0 / cr_span),
            kr: fix(cr_span),
            kg_u: fix(kb * cb_span / kg),
            kg_v: fix(kr * cr_span / kg),
            kb: fix(cb_span),
        }
    }
}

/// Fixed-point integer coefficients for both conversion directions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPointMatrix {
    /// RGB -> Y weights
    pub y_r: i32,
    pub y_g: i32,
    pub y_b: i32,
    /// (B - Y) -> Cb and (R - Y) -> Cr scales
    pub cb: i32,
    pub cr: i32,
    /// V contribution to R
    pub kr: i32,
    /// U and V contribution to G
    pub kg_u: i32,
    pub kg_v: i32,
    /// U contribution to B
    pub kb: i32,
}

#[inline]
fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// Convert packed RGB (3 bytes per pixel) into an NV12 frame.
///
/// Each chroma sample is the rounded mean of the Cb/Cr of its 2x2 block.
pub fn rgb_to_nv12(
    rgb: &[u8],
    width: u32,
    height: u32,
    color_space: ColorSpace,
    range: QuantizationRange,
) -> Result<Nv12Frame> {
    let mut frame = Nv12Frame::new(width, height)?;
    let w = width as usize;
    let h = height as usize;
    let needed = w * h * 3;
    if rgb.len() < needed {
        return Err(DewarpError::PlaneTooSmall {
            plane: "rgb",
            needed,
            actual: rgb.len(),
        });
    }

    let m = ColorMatrix::from_color_space(color_space).to_fixed_point();
    let (y_offset, y_scale, c_scale) = range.compression();

    // Full-range luma and centred chroma for one pixel
    let convert = |i: usize| -> (i32, i32, i32) {
        let r = rgb[i * 3] as i32;
        let g = rgb[i * 3 + 1] as i32;
        let b = rgb[i * 3 + 2] as i32;
        let y = (m.y_r * r + m.y_g * g + m.y_b * b + 128) >> 8;
        let u = ((b - y) * m.cb + 128) >> 8;
        let v = ((r - y) * m.cr + 128) >> 8;
        (y, u, v)
    };

    let (mut luma, mut chroma) = frame.planes_mut();
    for cy in 0..h / 2 {
        for cx in 0..w / 2 {
            let mut u_sum = 0;
            let mut v_sum = 0;
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                let (x, y) = (2 * cx + dx, 2 * cy + dy);
                let (yv, u, v) = convert(y * w + x);
                luma.row_mut(y)[x] = clamp_u8(y_offset + ((yv * y_scale + 128) >> 8));
                u_sum += u;
                v_sum += v;
            }
            let u = (u_sum + 2) >> 2;
            let v = (v_sum + 2) >> 2;
            let out = &mut chroma.row_mut(cy)[2 * cx..2 * cx + 2];
            out[0] = clamp_u8(128 + ((u * c_scale + 128) >> 8));
            out[1] = clamp_u8(128 + ((v * c_scale + 128) >> 8));
        }
    }
    Ok(frame)
}

/// Convert an NV12 frame into packed RGB (3 bytes per pixel).
pub fn nv12_to_rgb(frame: &Nv12Frame, color_space: ColorSpace, range: QuantizationRange) -> Vec<u8> {
    let matrix = ColorMatrix::from_color_space(color_space).to_fixed_point();
    let (y_offset, y_scale, c_scale) = range.expansion();
    let w = frame.width() as usize;
    let h = frame.height() as usize;
    let mut rgb = vec![0u8; w * h * 3];

    for (y, out) in rgb.chunks_exact_mut(w * 3).enumerate() {
        for (x, px) in out.chunks_exact_mut(3).enumerate() {
            let [u_raw, v_raw] = frame.chroma_at(x / 2, y / 2);
            let luma = ((frame.luma_at(x, y) as i32 - y_offset) * y_scale) >> 8;
            let u = ((u_raw as i32 - 128) * c_scale) >> 8;
            let v = ((v_raw as i32 - 128) * c_scale) >> 8;

            // R = Y + Kr * V
            // G = Y - Kg_u * U - Kg_v * V
            // B = Y + Kb * U
            px[0] = clamp_u8(luma + ((matrix.kr * v) >> 8));
            px[1] = clamp_u8(luma - ((matrix.kg_u * u + matrix.kg_v * v) >> 8));
            px[2] = clamp_u8(luma + ((matrix.kb * u) >> 8));
        }
    }
    rgb
}
