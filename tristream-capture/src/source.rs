//! Hardware capture service interface.
//!
//! These traits mirror the event-driven reader model of the Kinect runtime:
//! a device hands out one reader per modality, a reader is subscribed to a
//! frame-arrived event, and the subscription is polled with a bounded wait
//! before the ready frame is acquired and copied out.

use std::time::Duration;

use thiserror::Error;
use tristream_data::{Modality, PoolError, Ticks};

/// Errors that can occur during capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Failed to open {modality} reader: {reason}")]
    OpenFailed { modality: Modality, reason: String },

    #[error("Failed to subscribe to {modality} frames: {reason}")]
    SubscribeFailed { modality: Modality, reason: String },

    #[error("Failed to copy {modality} frame: {reason}")]
    CopyFailed { modality: Modality, reason: String },

    #[error("Frame pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("{0} capture thread panicked")]
    ThreadPanicked(Modality),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of waiting on a frame-arrived subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A frame is ready to be acquired.
    Ready,
    /// Nothing arrived within the timeout.
    Timeout,
    /// The wait itself failed for a reason other than timing out.
    Failed(String),
}

/// A frame that has been acquired from the device and can be copied out.
pub trait AcquiredFrame {
    /// Relative hardware time of the frame.
    fn timestamp(&self) -> Ticks;

    /// Copy the raw sensor data into `dst`.
    ///
    /// `dst` is exactly one frame in the stream's raw format.
    fn copy_into(&self, dst: &mut [u8]) -> Result<(), CaptureError>;
}

/// A reader subscribed to frame-arrived notifications.
pub trait FrameSubscription: Send {
    type Frame: AcquiredFrame;

    /// Block until a frame is ready or `timeout` elapses.
    fn wait(&mut self, timeout: Duration) -> WaitOutcome;

    /// Acquire the frame signalled by the last successful wait.
    ///
    /// Returns `None` when the frame expired before it could be acquired.
    fn acquire(&mut self) -> Option<Self::Frame>;
}

/// A per-modality reader handle.
pub trait FrameReader: Send {
    type Subscription: FrameSubscription;

    /// Subscribe to frame-arrived notifications.
    fn subscribe(&mut self) -> Result<Self::Subscription, CaptureError>;
}

/// A sensor that exposes depth, infrared and color readers.
pub trait SensorDevice: Send + Sync {
    type Reader: FrameReader;

    /// Open a reader for one modality.
    fn open_reader(&self, modality: Modality) -> Result<Self::Reader, CaptureError>;
}
