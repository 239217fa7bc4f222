//! Per-stream capture loop.
//!
//! One loop runs per modality on its own thread. It opens and subscribes a
//! reader, allocates the stream's pool, then alternates between a bounded
//! wait for the frame-arrived signal and acquiring the frame into the next
//! pool slot until the stream is full or the session is stopped.

use std::time::Duration;

use tracing::{debug, trace, warn};
use tristream_data::{FramePool, Modality, Resolution, Ticks};

use crate::preview::{PreviewSink, QuitSignal, Sample, preview_gain};
use crate::source::{
    AcquiredFrame, CaptureError, FrameReader, FrameSubscription, SensorDevice, WaitOutcome,
};
use crate::status::{StatusBoard, StopSignal};

/// Bounded wait for the next frame. Also the latency of observing a stop.
pub const WAIT_TIMEOUT: Duration = Duration::from_millis(200);

/// Where a capture loop is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Opening,
    Armed,
    Waiting,
    Acquiring,
    Done,
}

/// Why a capture loop reached [`LoopState::Done`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The stream filled its pool.
    CapacityReached,
    /// Another stream finished first and raised the session flag.
    SessionStopped,
    /// The user asked to quit.
    QuitRequested,
}

/// Transient events seen by a capture loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub timeouts: u64,
    pub wait_errors: u64,
    pub expired: u64,
}

/// Everything one stream captured.
#[derive(Debug)]
pub struct StreamCapture<T: bytemuck::Pod> {
    pub pool: FramePool<T>,
    pub stop_reason: StopReason,
    pub stats: LoopStats,
}

impl<T: bytemuck::Pod> StreamCapture<T> {
    pub fn count(&self) -> usize {
        self.pool.count()
    }
}

/// Shared session state a capture loop runs against.
#[derive(Debug, Clone)]
pub struct StreamContext<'a> {
    pub capacity: usize,
    pub resolution: Resolution,
    pub wait_timeout: Duration,
    pub stop: &'a StopSignal,
    pub quit: &'a QuitSignal,
    pub status: &'a StatusBoard,
}

struct CaptureLoop {
    modality: Modality,
    state: LoopState,
}

impl CaptureLoop {
    fn enter(&mut self, state: LoopState) {
        if self.state != state {
            trace!(stream = %self.modality, from = ?self.state, to = ?state, "Capture state");
            self.state = state;
        }
    }
}

/// Drive one modality from opening its reader to [`LoopState::Done`].
///
/// Whatever way the loop exits, including errors and panics, the session's
/// stop flag is raised on the way out: a finished stream is a stop request
/// for the whole session.
pub fn run_stream<D, T>(
    device: &D,
    modality: Modality,
    ctx: &StreamContext<'_>,
    preview: &mut dyn PreviewSink,
) -> Result<StreamCapture<T>, CaptureError>
where
    D: SensorDevice + ?Sized,
    T: Sample,
{
    let _announce = ctx.stop.stop_on_drop();
    let mut lp = CaptureLoop {
        modality,
        state: LoopState::Idle,
    };

    lp.enter(LoopState::Opening);
    let mut reader = device.open_reader(modality)?;

    let mut subscription = reader.subscribe()?;
    lp.enter(LoopState::Armed);
    let mut pool = if modality == Modality::Color {
        FramePool::<T>::with_guard_slot(modality, ctx.resolution, ctx.capacity)?
    } else {
        FramePool::<T>::allocate(modality, ctx.resolution, ctx.capacity)?
    };

    let live_preview = modality.has_live_preview() && preview.enabled();
    let mut stats = LoopStats::default();
    let mut last_timestamp: Option<Ticks> = None;
    let mut index = 0usize;

    let stop_reason = loop {
        if index >= ctx.capacity {
            break StopReason::CapacityReached;
        }
        if ctx.stop.is_stopped() {
            break StopReason::SessionStopped;
        }

        lp.enter(LoopState::Waiting);
        match subscription.wait(ctx.wait_timeout) {
            WaitOutcome::Timeout => {
                stats.timeouts += 1;
                warn!(stream = %modality, index, "Timed out waiting for frame");
            }
            WaitOutcome::Failed(reason) => {
                stats.wait_errors += 1;
                warn!(stream = %modality, index, %reason, "Frame wait failed");
            }
            WaitOutcome::Ready => {
                lp.enter(LoopState::Acquiring);
                match subscription.acquire() {
                    None => {
                        stats.expired += 1;
                        debug!(stream = %modality, index, "Frame expired before acquisition");
                    }
                    Some(frame) => {
                        let timestamp = frame.timestamp();
                        frame.copy_into(pool.slot_bytes_mut(index))?;
                        pool.commit(index, timestamp);

                        if last_timestamp.is_some_and(|prev| timestamp < prev) {
                            warn!(stream = %modality, index, %timestamp, "Timestamp went backwards");
                        }
                        last_timestamp = Some(timestamp);

                        if live_preview {
                            if let Some(samples) = pool.samples(index) {
                                let gain = preview_gain(modality);
                                if let Some(image) = T::render(samples, ctx.resolution, gain) {
                                    preview.present(modality, index, &image);
                                }
                            }
                        }
                        index += 1;
                    }
                }
            }
        }

        if modality.has_live_preview() && ctx.quit.is_requested() {
            break StopReason::QuitRequested;
        }
    };

    lp.enter(LoopState::Done);
    pool.seal(index);
    debug!(stream = %modality, frames = index, reason = ?stop_reason, ?stats, "Capture loop done");
    ctx.status
        .report(format!("{} frames in RAM: {}", modality.label(), pool.count()));

    Ok(StreamCapture {
        pool,
        stop_reason,
        stats,
    })
}
