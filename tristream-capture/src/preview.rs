//! Live preview of depth and infrared frames.
//!
//! Previews are rendered from the pool slot right after a frame is committed.
//! Where they go is up to the [`PreviewSink`]; the capture loop only cares
//! about the quit request, which arrives out of band through [`QuitSignal`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use image::{ImageBuffer, Luma, imageops};
use tracing::trace;
use tristream_data::{Modality, Resolution};

/// Gain applied to raw depth (millimetres) so it is visible as a 16-bit image.
pub const DEPTH_PREVIEW_GAIN: u16 = 18;

/// A rendered 16-bit grayscale preview.
pub type PreviewImage = ImageBuffer<Luma<u16>, Vec<u16>>;

/// Render a preview: scale by `gain` (saturating) and mirror about the
/// vertical axis, since the sensor delivers a mirrored image.
pub fn render_preview(samples: &[u16], resolution: Resolution, gain: u16) -> Option<PreviewImage> {
    if samples.len() != resolution.area() {
        return None;
    }
    let scaled: Vec<u16> = samples.iter().map(|&s| s.saturating_mul(gain)).collect();
    let image = PreviewImage::from_raw(resolution.width, resolution.height, scaled)?;
    Some(imageops::flip_horizontal(&image))
}

/// Preview gain for a modality.
pub fn preview_gain(modality: Modality) -> u16 {
    match modality {
        Modality::Depth => DEPTH_PREVIEW_GAIN,
        _ => 1,
    }
}

/// Sample element types that can be captured into a pool.
///
/// Only 16-bit streams render a live preview.
pub trait Sample: bytemuck::Pod + Send {
    fn render(samples: &[Self], resolution: Resolution, gain: u16) -> Option<PreviewImage>;
}

impl Sample for u16 {
    fn render(samples: &[u16], resolution: Resolution, gain: u16) -> Option<PreviewImage> {
        render_preview(samples, resolution, gain)
    }
}

impl Sample for u8 {
    fn render(_: &[u8], _: Resolution, _: u16) -> Option<PreviewImage> {
        None
    }
}

/// Destination for live previews.
pub trait PreviewSink: Send {
    /// Whether previews should be rendered at all.
    fn enabled(&self) -> bool {
        true
    }

    /// Show the preview of frame `index`.
    fn present(&mut self, modality: Modality, index: usize, image: &PreviewImage);
}

/// Discards previews without rendering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPreview;

impl PreviewSink for NullPreview {
    fn enabled(&self) -> bool {
        false
    }

    fn present(&mut self, _: Modality, _: usize, _: &PreviewImage) {}
}

/// Keeps the most recent preview so another thread can display it.
#[derive(Debug, Clone, Default)]
pub struct LatestPreview {
    latest: Arc<Mutex<Option<(usize, PreviewImage)>>>,
}

impl LatestPreview {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index and image of the last presented frame.
    pub fn latest(&self) -> Option<(usize, PreviewImage)> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PreviewSink for LatestPreview {
    fn present(&mut self, modality: Modality, index: usize, image: &PreviewImage) {
        trace!(stream = %modality, index, "Preview updated");
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some((index, image.clone()));
    }
}

/// Out-of-band quit request from the user.
///
/// Observed only by the streams with a live preview, at the point where their
/// preview is refreshed.
#[derive(Debug, Clone, Default)]
pub struct QuitSignal(Arc<AtomicBool>);

impl QuitSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
