//! Re-projection of color frames into depth pixel space.
//!
//! The sensor's coordinate mapper tells us, for every depth pixel, where it
//! lands in the color image. Sampling the decoded color planes at those
//! positions yields gray and RGB images aligned with the depth grid.

use glam::Vec2;
use image::{GrayImage, RgbImage};
use thiserror::Error;
use tracing::trace;
use tristream_data::Resolution;

use crate::yuy2::DecodedColor;

/// Errors reported by a coordinate mapper.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("coordinate mapping failed with code {code:#010x}")]
    Failed { code: u32 },

    #[error("depth frame has {actual} samples, mapper expects {expected}")]
    DepthLength { expected: usize, actual: usize },

    #[error("output holds {actual} coordinates, mapper expects {expected}")]
    OutputLength { expected: usize, actual: usize },
}

/// Hardware coordinate mapping service.
///
/// Implementations write one color-space coordinate per depth pixel into
/// `out`. Pixels without a valid mapping are reported as non-finite values
/// (the Kinect runtime uses negative infinity).
pub trait CoordinateMapper: Send + Sync {
    /// Map a depth frame into color image coordinates.
    fn map_depth_to_color(&self, depth: &[u16], out: &mut [Vec2]) -> Result<(), MappingError>;

    /// Depth grid this mapper expects.
    fn depth_resolution(&self) -> Resolution;
}

/// Linear depth-to-color mapper with a depth-dependent horizontal parallax.
///
/// `color = depth_pixel * scale + offset + (parallax / depth_mm, 0)`
///
/// Useful for simulated sessions and tests. Zero depth maps to negative
/// infinity, like an invalid pixel from the real mapper.
#[derive(Debug, Clone, Copy)]
pub struct AffineMapper {
    depth: Resolution,
    scale: Vec2,
    offset: Vec2,
    parallax: f32,
}

impl AffineMapper {
    pub fn new(depth: Resolution, scale: Vec2, offset: Vec2) -> Self {
        Self {
            depth,
            scale,
            offset,
            parallax: 0.0,
        }
    }

    /// Horizontal shift in color pixels times millimetres.
    pub fn with_parallax(mut self, parallax: f32) -> Self {
        self.parallax = parallax;
        self
    }

    /// Rough approximation of the Kinect v2 depth-to-color geometry.
    ///
    /// Focal lengths of ~365 px (depth) and ~1081 px (color) with aligned
    /// optical centres and a 52 mm baseline.
    pub fn kinect_v2() -> Self {
        let depth = Resolution::new(512, 424);
        let scale = Vec2::splat(1081.37 / 365.46);
        let offset = Vec2::new(959.5, 539.5) - Vec2::new(255.5, 211.5) * scale;
        Self::new(depth, scale, offset).with_parallax(-52.0 * 1081.37)
    }

    /// Scale a depth grid onto a color grid of a different size.
    pub fn stretch(depth: Resolution, color: Resolution) -> Self {
        let scale = Vec2::new(
            color.width as f32 / depth.width as f32,
            color.height as f32 / depth.height as f32,
        );
        Self::new(depth, scale, Vec2::ZERO)
    }
}

impl CoordinateMapper for AffineMapper {
    fn map_depth_to_color(&self, depth: &[u16], out: &mut [Vec2]) -> Result<(), MappingError> {
        let expected = self.depth.area();
        if depth.len() != expected {
            return Err(MappingError::DepthLength {
                expected,
                actual: depth.len(),
            });
        }
        if out.len() != expected {
            return Err(MappingError::OutputLength {
                expected,
                actual: out.len(),
            });
        }

        let width = self.depth.width as usize;
        for (j, (&d, coord)) in depth.iter().zip(out.iter_mut()).enumerate() {
            if d == 0 {
                *coord = Vec2::NEG_INFINITY;
                continue;
            }
            let pixel = Vec2::new((j % width) as f32, (j / width) as f32);
            let shift = Vec2::new(self.parallax / f32::from(d), 0.0);
            *coord = pixel * self.scale + self.offset + shift;
        }
        Ok(())
    }

    fn depth_resolution(&self) -> Resolution {
        self.depth
    }
}

/// Round half up to an integer pixel coordinate.
///
/// `2.5 -> 3`, `-2.5 -> -2`. Non-finite input has no pixel.
#[inline]
pub fn round_half_up(value: f32) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    // Exact in f64; in f32 the largest value below 0.5 would round up.
    Some((f64::from(value) + 0.5).floor() as i64)
}

/// Color planes resampled onto the depth grid.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedColor {
    pub gray: GrayImage,
    pub rgb: RgbImage,
}

/// Sample `color` at `coords`, one coordinate per depth pixel.
///
/// Coordinates that round outside the color image leave the output at zero.
pub fn resample(coords: &[Vec2], color: &DecodedColor, depth: Resolution) -> AlignedColor {
    let bounds = color.resolution();
    let mut gray = GrayImage::new(depth.width, depth.height);
    let mut rgb = RgbImage::new(depth.width, depth.height);
    let width = depth.width as usize;
    let mut hits = 0usize;

    for (j, coord) in coords.iter().enumerate().take(depth.area()) {
        let (Some(x), Some(y)) = (round_half_up(coord.x), round_half_up(coord.y)) else {
            continue;
        };
        if !bounds.contains(x, y) {
            continue;
        }
        let (dx, dy) = ((j % width) as u32, (j / width) as u32);
        let (cx, cy) = (x as u32, y as u32);
        gray.put_pixel(dx, dy, *color.gray.get_pixel(cx, cy));
        rgb.put_pixel(dx, dy, *color.rgb.get_pixel(cx, cy));
        hits += 1;
    }

    trace!(hits, total = depth.area(), "Resampled color into depth space");
    AlignedColor { gray, rgb }
}

/// Re-projects decoded color frames onto the depth grid.
///
/// Holds a scratch coordinate buffer so repeated calls do not reallocate.
/// The buffer is fully reset on every call; output depends only on the inputs.
#[derive(Debug)]
pub struct Reprojector {
    depth: Resolution,
    coords: Vec<Vec2>,
}

impl Reprojector {
    pub fn new(depth: Resolution) -> Self {
        Self {
            depth,
            coords: vec![Vec2::NEG_INFINITY; depth.area()],
        }
    }

    pub fn depth_resolution(&self) -> Resolution {
        self.depth
    }

    /// Map `depth_samples` through `mapper` and resample `color` accordingly.
    pub fn reproject<M>(
        &mut self,
        mapper: &M,
        depth_samples: &[u16],
        color: &DecodedColor,
    ) -> Result<AlignedColor, MappingError>
    where
        M: CoordinateMapper + ?Sized,
    {
        self.coords.fill(Vec2::NEG_INFINITY);
        mapper.map_depth_to_color(depth_samples, &mut self.coords)?;
        Ok(resample(&self.coords, color, self.depth))
    }
}
