//! Packed YUY2 decoding.
//!
//! YUY2 stores two horizontally adjacent pixels in four bytes as
//! `Y0 U Y1 V`; both pixels share the chroma pair.

use image::{GrayImage, RgbImage};
use tristream_data::Resolution;

use crate::ColorError;

/// Convert one luma / chroma triple to RGB using the integer BT.601
/// studio-swing transform.
///
/// The fixed-point coefficients and the `+128 >> 8` rounding are part of the
/// output format and must not be replaced with a float conversion.
#[inline]
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = i32::from(y) - 16;
    let d = i32::from(u) - 128;
    let e = i32::from(v) - 128;
    let r = (298 * c + 409 * e + 128) >> 8;
    let g = (298 * c - 100 * d - 208 * e + 128) >> 8;
    let b = (298 * c + 516 * d + 128) >> 8;
    [saturate(r), saturate(g), saturate(b)]
}

#[inline]
fn saturate(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

fn check_frame(raw: &[u8], resolution: Resolution) -> Result<(), ColorError> {
    if resolution.width % 2 != 0 {
        return Err(ColorError::OddWidth(resolution.width));
    }
    let expected = resolution.area() * 2;
    if raw.len() != expected {
        return Err(ColorError::BufferSize {
            expected,
            actual: raw.len(),
        });
    }
    Ok(())
}

/// Luma plane of a YUY2 frame.
pub fn yuy2_to_gray(raw: &[u8], resolution: Resolution) -> Result<GrayImage, ColorError> {
    check_frame(raw, resolution)?;
    let luma: Vec<u8> = raw.chunks_exact(2).map(|pair| pair[0]).collect();
    GrayImage::from_raw(resolution.width, resolution.height, luma)
        .ok_or(ColorError::Image("gray plane"))
}

/// Full RGB conversion of a YUY2 frame.
pub fn yuy2_to_rgb(raw: &[u8], resolution: Resolution) -> Result<RgbImage, ColorError> {
    check_frame(raw, resolution)?;
    let mut rgb = Vec::with_capacity(resolution.area() * 3);
    for unit in raw.chunks_exact(4) {
        let (y0, u, y1, v) = (unit[0], unit[1], unit[2], unit[3]);
        rgb.extend_from_slice(&yuv_to_rgb(y0, u, v));
        rgb.extend_from_slice(&yuv_to_rgb(y1, u, v));
    }
    RgbImage::from_raw(resolution.width, resolution.height, rgb)
        .ok_or(ColorError::Image("rgb plane"))
}

/// Both planes of a decoded color frame, at color resolution.
#[derive(Debug, Clone)]
pub struct DecodedColor {
    pub gray: GrayImage,
    pub rgb: RgbImage,
}

impl DecodedColor {
    pub fn decode(raw: &[u8], resolution: Resolution) -> Result<Self, ColorError> {
        Ok(Self {
            gray: yuy2_to_gray(raw, resolution)?,
            rgb: yuy2_to_rgb(raw, resolution)?,
        })
    }

    pub fn resolution(&self) -> Resolution {
        let (width, height) = self.gray.dimensions();
        Resolution::new(width, height)
    }
}
