//! Tristream Capture - depth, infrared and color capture into frame pools
//!
//! A [`CaptureSession`] runs one capture loop per modality on its own thread.
//! Each loop waits on its [`FrameSubscription`] with a bounded timeout, copies
//! ready frames into a preallocated [`FramePool`](tristream_data::FramePool)
//! and stops when the pool is full, the shared [`StopSignal`] is raised, or
//! (for streams with a live preview) the user asks to quit.
//!
//! Hardware access goes through the [`SensorDevice`] family of traits.
//! [`SimulatedDevice`] implements them with synthetic frames at configurable
//! rates.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tristream_capture::{CaptureSession, SessionConfig, SimulatedDevice};
//!
//! let device = Arc::new(SimulatedDevice::kinect_v2());
//! let session = CaptureSession::new(device, SessionConfig::from_seconds(10, 30));
//! let capture = session.start()?.join()?;
//! println!("{:?}", capture.counts());
//! ```

mod capture;
mod preview;
mod session;
mod simulated;
mod source;
mod status;

pub use capture::{
    LoopState, LoopStats, StopReason, StreamCapture, StreamContext, WAIT_TIMEOUT, run_stream,
};
pub use preview::{
    DEPTH_PREVIEW_GAIN, LatestPreview, NullPreview, PreviewImage, PreviewSink, QuitSignal, Sample,
    preview_gain, render_preview,
};
pub use session::{
    CaptureSession, DEFAULT_SECONDS_TO_CAPTURE, RunningSession, SessionCapture, SessionConfig,
    SessionCounts,
};
pub use simulated::{
    SimulatedDevice, SimulatedFrame, SimulatedReader, SimulatedSubscription, StreamProfile,
};
pub use source::{
    AcquiredFrame, CaptureError, FrameReader, FrameSubscription, SensorDevice, WaitOutcome,
};
pub use status::{StatusBoard, StopOnDrop, StopSignal};
