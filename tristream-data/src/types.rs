//! Core stream types shared by capture, decoding and persistence.
//!
//! Geometry defaults follow the Kinect for Windows v2 sensor: depth and
//! infrared share a 512x424 grid of 16-bit samples, color is delivered as
//! 1920x1080 packed YUY2.

use std::fmt;

/// Relative timestamp units per microsecond.
pub const TICKS_PER_US: i64 = 10;
/// Relative timestamp units per millisecond.
pub const TICKS_PER_MS: i64 = 10_000;

/// Nominal frame rate of all three streams.
/// Color drops to 15 FPS in low light.
pub const DEFAULT_FRAMES_PER_SECOND: u32 = 30;

/// One of the three physical sensing channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    Depth,
    Infrared,
    Color,
}

impl Modality {
    /// All modalities in the order their capture threads are started.
    pub const ALL: [Modality; 3] = [Modality::Depth, Modality::Infrared, Modality::Color];

    /// Native sensor resolution for this modality.
    pub fn default_resolution(self) -> Resolution {
        match self {
            Modality::Depth | Modality::Infrared => Resolution::new(512, 424),
            Modality::Color => Resolution::new(1920, 1080),
        }
    }

    /// Bytes per pixel in the raw sensor format.
    ///
    /// Depth and infrared are one `u16` per pixel. Color is YUY2, which packs
    /// two pixels into four bytes.
    pub fn bytes_per_pixel(self) -> usize {
        2
    }

    /// Whether the capture loop renders a live preview for this stream.
    ///
    /// Decoding YUY2 for display is too expensive to do per frame, so color
    /// has none.
    pub fn has_live_preview(self) -> bool {
        !matches!(self, Modality::Color)
    }

    /// Lowercase name used in thread names and log fields.
    pub fn name(self) -> &'static str {
        match self {
            Modality::Depth => "depth",
            Modality::Infrared => "infra",
            Modality::Color => "color",
        }
    }

    /// Capitalized label used in user-facing status lines.
    pub fn label(self) -> &'static str {
        match self {
            Modality::Depth => "Depth",
            Modality::Infrared => "Infra",
            Modality::Color => "Color",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pixel dimensions of a stream (width, height).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels.
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether integer pixel coordinates fall inside `[0, width) x [0, height)`.
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Hardware relative time, in 100 ns ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticks(i64);

impl Ticks {
    pub const ZERO: Ticks = Ticks(0);

    pub fn new(ticks: i64) -> Self {
        Self(ticks)
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms * TICKS_PER_MS)
    }

    pub fn as_ticks(&self) -> i64 {
        self.0
    }

    pub fn as_micros(&self) -> i64 {
        self.0 / TICKS_PER_US
    }

    pub fn as_millis(&self) -> i64 {
        self.0 / TICKS_PER_MS
    }
}

impl fmt::Display for Ticks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of frames a stream needs to cover `seconds` at `fps`.
pub fn frames_for_duration(seconds: u32, fps: u32) -> usize {
    seconds as usize * fps as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_geometry() {
        assert_eq!(Modality::Depth.default_resolution().area(), 512 * 424);
        assert_eq!(
            Modality::Infrared.default_resolution(),
            Modality::Depth.default_resolution()
        );
        assert_eq!(Modality::Color.default_resolution(), Resolution::new(1920, 1080));
    }

    #[test]
    fn test_only_color_skips_preview() {
        assert!(Modality::Depth.has_live_preview());
        assert!(Modality::Infrared.has_live_preview());
        assert!(!Modality::Color.has_live_preview());
    }

    #[test]
    fn test_resolution_contains_is_half_open() {
        let r = Resolution::new(4, 3);
        assert!(r.contains(0, 0));
        assert!(r.contains(3, 2));
        assert!(!r.contains(4, 0));
        assert!(!r.contains(0, 3));
        assert!(!r.contains(-1, 1));
    }

    #[test]
    fn test_tick_conversions() {
        let t = Ticks::from_millis(33);
        assert_eq!(t.as_ticks(), 330_000);
        assert_eq!(t.as_micros(), 33_000);
        assert_eq!(t.as_millis(), 33);
    }

    #[test]
    fn test_frames_for_duration() {
        assert_eq!(frames_for_duration(30, DEFAULT_FRAMES_PER_SECOND), 900);
        assert_eq!(frames_for_duration(60, DEFAULT_FRAMES_PER_SECOND), 1800);
    }
}
