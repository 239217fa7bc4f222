//! Tristream Color Crate
//!
//! Decodes packed YUY2 color frames into gray and RGB planes and re-projects
//! them onto the depth sensor's pixel grid through a [`CoordinateMapper`].

mod reproject;
mod yuy2;

use thiserror::Error;

pub use reproject::{
    AffineMapper, AlignedColor, CoordinateMapper, MappingError, Reprojector, resample,
    round_half_up,
};
pub use yuy2::{DecodedColor, yuv_to_rgb, yuy2_to_gray, yuy2_to_rgb};

/// Errors that can occur while decoding color frames.
#[derive(Debug, Error)]
pub enum ColorError {
    #[error("YUY2 frame is {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("YUY2 width must be even, got {0}")]
    OddWidth(u32),

    #[error("Failed to build {0} image")]
    Image(&'static str),
}
