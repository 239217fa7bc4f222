//! Capture session coordinator.
//!
//! Runs the depth, infrared and color loops on three threads that share one
//! [`StopSignal`] and one [`StatusBoard`]. The first loop to finish stops the
//! other two, so per-stream counts usually differ and stay at or below the
//! configured capacity.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{error, info};
use tristream_data::{DEFAULT_FRAMES_PER_SECOND, Modality, Resolution, frames_for_duration};

use crate::capture::{StreamCapture, StreamContext, WAIT_TIMEOUT, run_stream};
use crate::preview::{NullPreview, PreviewSink, QuitSignal, Sample};
use crate::source::{CaptureError, SensorDevice};
use crate::status::{StatusBoard, StopSignal};

/// Default capture length.
pub const DEFAULT_SECONDS_TO_CAPTURE: u32 = 60;

/// Fixed-for-the-session capture parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    capacity: usize,
    frame_rate: u32,
    wait_timeout: Duration,
    resolutions: [Resolution; 3],
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_seconds(DEFAULT_SECONDS_TO_CAPTURE, DEFAULT_FRAMES_PER_SECOND)
    }
}

impl SessionConfig {
    /// Capacity for `seconds` of capture at `fps`, Kinect v2 geometry.
    pub fn from_seconds(seconds: u32, fps: u32) -> Self {
        Self {
            capacity: frames_for_duration(seconds, fps),
            frame_rate: fps,
            wait_timeout: WAIT_TIMEOUT,
            resolutions: Modality::ALL.map(Modality::default_resolution),
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn with_resolution(mut self, modality: Modality, resolution: Resolution) -> Self {
        self.resolutions[index_of(modality)] = resolution;
        self
    }

    /// Per-stream frame capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frame rate the capacity was derived from.
    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    pub fn resolution(&self, modality: Modality) -> Resolution {
        self.resolutions[index_of(modality)]
    }

    /// Bytes of sample storage the session preallocates across all streams.
    pub fn pool_bytes(&self) -> usize {
        Modality::ALL
            .iter()
            .map(|&m| {
                let slots = if m == Modality::Color {
                    self.capacity + 1
                } else {
                    self.capacity
                };
                slots * self.resolution(m).area() * m.bytes_per_pixel()
            })
            .sum()
    }
}

fn index_of(modality: Modality) -> usize {
    match modality {
        Modality::Depth => 0,
        Modality::Infrared => 1,
        Modality::Color => 2,
    }
}

/// Frames captured per stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionCounts {
    pub depth: usize,
    pub infrared: usize,
    pub color: usize,
}

/// The frozen result of a capture session.
#[derive(Debug)]
pub struct SessionCapture {
    pub depth: StreamCapture<u16>,
    pub infrared: StreamCapture<u16>,
    pub color: StreamCapture<u8>,
}

impl SessionCapture {
    pub fn counts(&self) -> SessionCounts {
        SessionCounts {
            depth: self.depth.count(),
            infrared: self.infrared.count(),
            color: self.color.count(),
        }
    }
}

/// A capture session that has not been started yet.
pub struct CaptureSession<D> {
    device: Arc<D>,
    config: SessionConfig,
    stop: StopSignal,
    quit: QuitSignal,
    status: StatusBoard,
    depth_preview: Box<dyn PreviewSink>,
    infrared_preview: Box<dyn PreviewSink>,
}

impl<D> CaptureSession<D>
where
    D: SensorDevice + 'static,
{
    pub fn new(device: Arc<D>, config: SessionConfig) -> Self {
        Self {
            device,
            config,
            stop: StopSignal::new(),
            quit: QuitSignal::new(),
            status: StatusBoard::stdout(),
            depth_preview: Box::new(NullPreview),
            infrared_preview: Box::new(NullPreview),
        }
    }

    pub fn with_status(mut self, status: StatusBoard) -> Self {
        self.status = status;
        self
    }

    pub fn with_quit_signal(mut self, quit: QuitSignal) -> Self {
        self.quit = quit;
        self
    }

    /// Route live previews of a stream to `sink`. Color has no live preview.
    pub fn with_preview(mut self, modality: Modality, sink: Box<dyn PreviewSink>) -> Self {
        match modality {
            Modality::Depth => self.depth_preview = sink,
            Modality::Infrared => self.infrared_preview = sink,
            Modality::Color => {}
        }
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Handle for stopping the session from outside.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Launch all three capture loops.
    pub fn start(self) -> Result<RunningSession, CaptureError> {
        let Self {
            device,
            config,
            stop,
            quit,
            status,
            depth_preview,
            infrared_preview,
        } = self;
        info!(
            capacity = config.capacity,
            fps = config.frame_rate,
            "Starting capture session"
        );
        let shared = Arc::new(Shared {
            config,
            stop,
            quit,
            status,
        });

        let depth = spawn_stream::<D, u16>(&device, &shared, Modality::Depth, depth_preview)?;
        let infrared =
            match spawn_stream::<D, u16>(&device, &shared, Modality::Infrared, infrared_preview) {
                Ok(handle) => handle,
                Err(e) => {
                    shared.stop.request_stop();
                    let _ = depth.join();
                    return Err(e);
                }
            };
        let color =
            match spawn_stream::<D, u8>(&device, &shared, Modality::Color, Box::new(NullPreview)) {
                Ok(handle) => handle,
                Err(e) => {
                    shared.stop.request_stop();
                    let _ = depth.join();
                    let _ = infrared.join();
                    return Err(e);
                }
            };

        Ok(RunningSession {
            depth,
            infrared,
            color,
            stop: shared.stop.clone(),
        })
    }
}

struct Shared {
    config: SessionConfig,
    stop: StopSignal,
    quit: QuitSignal,
    status: StatusBoard,
}

type StreamHandle<T> = JoinHandle<Result<StreamCapture<T>, CaptureError>>;

fn spawn_stream<D, T>(
    device: &Arc<D>,
    shared: &Arc<Shared>,
    modality: Modality,
    mut preview: Box<dyn PreviewSink>,
) -> Result<StreamHandle<T>, CaptureError>
where
    D: SensorDevice + 'static,
    T: Sample + 'static,
{
    let device = Arc::clone(device);
    let shared = Arc::clone(shared);
    let handle = thread::Builder::new()
        .name(format!("capture-{}", modality.name()))
        .spawn(move || {
            let ctx = StreamContext {
                capacity: shared.config.capacity,
                resolution: shared.config.resolution(modality),
                wait_timeout: shared.config.wait_timeout,
                stop: &shared.stop,
                quit: &shared.quit,
                status: &shared.status,
            };
            run_stream::<D, T>(device.as_ref(), modality, &ctx, preview.as_mut())
        })?;
    Ok(handle)
}

fn join_stream<T: bytemuck::Pod>(
    handle: StreamHandle<T>,
    modality: Modality,
) -> Result<StreamCapture<T>, CaptureError> {
    match handle.join() {
        Ok(Ok(capture)) => Ok(capture),
        Ok(Err(e)) => {
            error!(stream = %modality, error = %e, "Capture failed");
            Err(e)
        }
        Err(_) => {
            error!(stream = %modality, "Capture thread panicked");
            Err(CaptureError::ThreadPanicked(modality))
        }
    }
}

/// A session whose capture threads are running.
pub struct RunningSession {
    depth: StreamHandle<u16>,
    infrared: StreamHandle<u16>,
    color: StreamHandle<u8>,
    stop: StopSignal,
}

impl RunningSession {
    /// Handle for stopping the session from outside.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Whether all three loops have exited.
    pub fn is_finished(&self) -> bool {
        self.depth.is_finished() && self.infrared.is_finished() && self.color.is_finished()
    }

    /// Block until all three loops are done.
    ///
    /// Every thread is joined before any error is reported; the first failing
    /// stream (in depth, infrared, color order) determines the error.
    pub fn join(self) -> Result<SessionCapture, CaptureError> {
        let depth = join_stream(self.depth, Modality::Depth);
        let infrared = join_stream(self.infrared, Modality::Infrared);
        let color = join_stream(self.color, Modality::Color);

        let capture = SessionCapture {
            depth: depth?,
            infrared: infrared?,
            color: color?,
        };
        let counts = capture.counts();
        info!(
            depth = counts.depth,
            infrared = counts.infrared,
            color = counts.color,
            "Capture session complete"
        );
        Ok(capture)
    }
}
