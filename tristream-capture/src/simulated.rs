//! In-process stand-in for a Kinect v2 sensor.
//!
//! Frames become due on a fixed schedule from a shared device epoch, carry
//! hardware-style tick timestamps and contain deterministic synthetic data.
//! A reader that falls behind skips to the newest due frame, as the real
//! runtime does.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};
use tristream_color::AffineMapper;
use tristream_data::{Modality, Resolution, Ticks};

use crate::source::{
    AcquiredFrame, CaptureError, FrameReader, FrameSubscription, SensorDevice, WaitOutcome,
};

/// Timing and geometry of one simulated stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamProfile {
    pub resolution: Resolution,
    pub fps: f32,
    /// Offset of the first frame from the device epoch.
    pub phase: Duration,
    /// Every n-th ready frame expires before it can be acquired.
    pub expire_every: Option<u64>,
    /// Opening this stream's reader fails.
    pub fail_open: bool,
}

impl StreamProfile {
    pub fn new(resolution: Resolution, fps: f32) -> Self {
        Self {
            resolution,
            fps,
            phase: Duration::ZERO,
            expire_every: None,
            fail_open: false,
        }
    }

    /// Kinect v2 defaults for a modality. Color lags depth by a few ms.
    pub fn kinect_v2(modality: Modality) -> Self {
        let profile = Self::new(modality.default_resolution(), 30.0);
        match modality {
            Modality::Color => profile.with_phase(Duration::from_millis(5)),
            _ => profile,
        }
    }

    pub fn with_phase(mut self, phase: Duration) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_expire_every(mut self, n: u64) -> Self {
        self.expire_every = Some(n.max(1));
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps.max(f32::EPSILON)))
    }

    fn due(&self, seq: u64) -> Duration {
        self.phase + self.period().mul_f64(seq as f64)
    }
}

#[derive(Debug)]
struct DeviceInner {
    epoch: Instant,
    profiles: [StreamProfile; 3],
}

/// Simulated three-stream sensor.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    inner: Arc<DeviceInner>,
}

fn slot(modality: Modality) -> usize {
    match modality {
        Modality::Depth => 0,
        Modality::Infrared => 1,
        Modality::Color => 2,
    }
}

impl SimulatedDevice {
    /// A sensor with Kinect v2 geometry and 30 FPS on every stream.
    pub fn kinect_v2() -> Self {
        Self::with_profiles(Modality::ALL.map(StreamProfile::kinect_v2))
    }

    /// A sensor with explicit per-stream profiles, in `Modality::ALL` order.
    pub fn with_profiles(profiles: [StreamProfile; 3]) -> Self {
        info!(
            depth = %profiles[0].resolution,
            color = %profiles[2].resolution,
            "Simulated sensor opened"
        );
        Self {
            inner: Arc::new(DeviceInner {
                epoch: Instant::now(),
                profiles,
            }),
        }
    }

    /// Same geometry for all streams with per-stream frame rates.
    pub fn uniform(resolution: Resolution, fps: [f32; 3]) -> Self {
        Self::with_profiles(fps.map(|f| StreamProfile::new(resolution, f)))
    }

    /// Replace one stream's profile. Only meaningful before readers are open.
    pub fn with_profile(self, modality: Modality, profile: StreamProfile) -> Self {
        let mut profiles = self.inner.profiles;
        profiles[slot(modality)] = profile;
        Self::with_profiles(profiles)
    }

    pub fn profile(&self, modality: Modality) -> &StreamProfile {
        &self.inner.profiles[slot(modality)]
    }

    /// Coordinate mapper matching this device's depth and color geometry.
    pub fn coordinate_mapper(&self) -> AffineMapper {
        let depth = self.profile(Modality::Depth).resolution;
        let color = self.profile(Modality::Color).resolution;
        if depth == Modality::Depth.default_resolution()
            && color == Modality::Color.default_resolution()
        {
            AffineMapper::kinect_v2()
        } else {
            AffineMapper::stretch(depth, color)
        }
    }
}

impl SensorDevice for SimulatedDevice {
    type Reader = SimulatedReader;

    fn open_reader(&self, modality: Modality) -> Result<SimulatedReader, CaptureError> {
        let profile = *self.profile(modality);
        if profile.fail_open {
            return Err(CaptureError::OpenFailed {
                modality,
                reason: "simulated open failure".to_string(),
            });
        }
        debug!(stream = %modality, fps = profile.fps, "Opened simulated reader");
        Ok(SimulatedReader {
            modality,
            profile,
            epoch: self.inner.epoch,
        })
    }
}

/// Reader for one simulated stream.
#[derive(Debug)]
pub struct SimulatedReader {
    modality: Modality,
    profile: StreamProfile,
    epoch: Instant,
}

impl FrameReader for SimulatedReader {
    type Subscription = SimulatedSubscription;

    fn subscribe(&mut self) -> Result<SimulatedSubscription, CaptureError> {
        Ok(SimulatedSubscription {
            modality: self.modality,
            profile: self.profile,
            epoch: self.epoch,
            next_seq: 0,
            ready: None,
            signalled: 0,
        })
    }
}

/// Frame-arrived subscription on a simulated stream.
#[derive(Debug)]
pub struct SimulatedSubscription {
    modality: Modality,
    profile: StreamProfile,
    epoch: Instant,
    next_seq: u64,
    ready: Option<u64>,
    signalled: u64,
}

impl FrameSubscription for SimulatedSubscription {
    type Frame = SimulatedFrame;

    fn wait(&mut self, timeout: Duration) -> WaitOutcome {
        let now = self.epoch.elapsed();

        // Skip frames the caller was too slow to pick up.
        let period = self.profile.period();
        if now > self.profile.phase && !period.is_zero() {
            let newest = ((now - self.profile.phase).as_secs_f64() / period.as_secs_f64()) as u64;
            self.next_seq = self.next_seq.max(newest);
        }

        let due = self.profile.due(self.next_seq);
        if due > now + timeout {
            thread::sleep(timeout);
            return WaitOutcome::Timeout;
        }
        if due > now {
            thread::sleep(due - now);
        }

        self.ready = Some(self.next_seq);
        self.next_seq += 1;
        self.signalled += 1;
        WaitOutcome::Ready
    }

    fn acquire(&mut self) -> Option<SimulatedFrame> {
        let seq = self.ready.take()?;
        if let Some(n) = self.profile.expire_every {
            if self.signalled % n == 0 {
                return None;
            }
        }
        let due = self.profile.due(seq);
        Some(SimulatedFrame {
            modality: self.modality,
            resolution: self.profile.resolution,
            seq,
            timestamp: Ticks::new((due.as_nanos() / 100) as i64),
        })
    }
}

/// A frame acquired from a simulated stream.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedFrame {
    modality: Modality,
    resolution: Resolution,
    seq: u64,
    timestamp: Ticks,
}

impl SimulatedFrame {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl AcquiredFrame for SimulatedFrame {
    fn timestamp(&self) -> Ticks {
        self.timestamp
    }

    fn copy_into(&self, dst: &mut [u8]) -> Result<(), CaptureError> {
        let expected = self.resolution.area() * self.modality.bytes_per_pixel();
        if dst.len() != expected {
            return Err(CaptureError::CopyFailed {
                modality: self.modality,
                reason: format!("buffer is {} bytes, frame is {expected}", dst.len()),
            });
        }

        let width = self.resolution.width as usize;
        let seq = self.seq as usize;
        match self.modality {
            Modality::Depth => {
                for (j, px) in dst.chunks_exact_mut(2).enumerate() {
                    let (x, y) = (j % width, j / width);
                    // A dead column every 64 pixels, like the sensor's invalid pixels.
                    let mm = if x % 64 == 0 {
                        0
                    } else {
                        (500 + (x + y + seq) % 4000) as u16
                    };
                    px.copy_from_slice(&mm.to_ne_bytes());
                }
            }
            Modality::Infrared => {
                for (j, px) in dst.chunks_exact_mut(2).enumerate() {
                    let (x, y) = (j % width, j / width);
                    let level = ((x * 131 + y * 61 + seq * 97) % 65_536) as u16;
                    px.copy_from_slice(&level.to_ne_bytes());
                }
            }
            Modality::Color => {
                let pairs = width / 2;
                for (k, unit) in dst.chunks_exact_mut(4).enumerate() {
                    let (x, y) = ((k % pairs.max(1)) * 2, k / pairs.max(1));
                    unit[0] = (16 + (x + seq) % 220) as u8;
                    unit[1] = (128 + y % 64) as u8;
                    unit[2] = (16 + (x + 1 + seq) % 220) as u8;
                    unit[3] = (128 - (y % 64)) as u8;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny(fps: f32) -> SimulatedDevice {
        SimulatedDevice::uniform(Resolution::new(4, 2), [fps; 3])
    }

    fn next_frame(sub: &mut SimulatedSubscription) -> SimulatedFrame {
        loop {
            if sub.wait(Duration::from_millis(200)) == WaitOutcome::Ready {
                if let Some(frame) = sub.acquire() {
                    return frame;
                }
            }
        }
    }

    #[test]
    fn test_frames_have_increasing_timestamps() {
        let device = tiny(1000.0);
        let mut reader = device.open_reader(Modality::Depth).unwrap();
        let mut sub = reader.subscribe().unwrap();
        let mut last = None;
        for _ in 0..10 {
            let ts = next_frame(&mut sub).timestamp();
            if let Some(prev) = last {
                assert!(ts > prev);
            }
            last = Some(ts);
        }
    }

    #[test]
    fn test_slow_stream_times_out() {
        let device = tiny(1.0).with_profile(
            Modality::Color,
            StreamProfile::new(Resolution::new(4, 2), 1.0).with_phase(Duration::from_secs(5)),
        );
        let mut reader = device.open_reader(Modality::Color).unwrap();
        let mut sub = reader.subscribe().unwrap();
        assert_eq!(sub.wait(Duration::from_millis(5)), WaitOutcome::Timeout);
        assert!(sub.acquire().is_none());
    }

    #[test]
    fn test_expiring_frames() {
        let device = tiny(1000.0).with_profile(
            Modality::Infrared,
            StreamProfile::new(Resolution::new(4, 2), 1000.0).with_expire_every(2),
        );
        let mut reader = device.open_reader(Modality::Infrared).unwrap();
        let mut sub = reader.subscribe().unwrap();

        assert_eq!(sub.wait(Duration::from_millis(200)), WaitOutcome::Ready);
        assert!(sub.acquire().is_some());
        assert_eq!(sub.wait(Duration::from_millis(200)), WaitOutcome::Ready);
        assert!(sub.acquire().is_none());
    }

    #[test]
    fn test_open_failure() {
        let device = tiny(30.0).with_profile(
            Modality::Depth,
            StreamProfile::new(Resolution::new(4, 2), 30.0).failing_open(),
        );
        assert!(matches!(
            device.open_reader(Modality::Depth),
            Err(CaptureError::OpenFailed { modality: Modality::Depth, .. })
        ));
    }

    #[test]
    fn test_copy_checks_buffer_size() {
        let device = tiny(1000.0);
        let mut reader = device.open_reader(Modality::Color).unwrap();
        let mut sub = reader.subscribe().unwrap();
        let frame = next_frame(&mut sub);

        let mut short = vec![0u8; 3];
        assert!(frame.copy_into(&mut short).is_err());

        let mut buf = vec![0u8; 16];
        frame.copy_into(&mut buf).unwrap();
        assert!(buf.chunks_exact(2).all(|p| p[0] >= 16));
    }

    #[test]
    fn test_depth_has_invalid_column() {
        let device = tiny(1000.0);
        let mut reader = device.open_reader(Modality::Depth).unwrap();
        let mut sub = reader.subscribe().unwrap();
        let frame = next_frame(&mut sub);
        let mut buf = vec![0u8; 16];
        frame.copy_into(&mut buf).unwrap();
        let samples: Vec<u16> = buf
            .chunks_exact(2)
            .map(|b| u16::from_ne_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(samples[0], 0);
        assert!(samples[1] >= 500);
    }

    #[test]
    fn test_mapper_matches_geometry() {
        use tristream_color::CoordinateMapper;
        let device = tiny(30.0);
        assert_eq!(
            device.coordinate_mapper().depth_resolution(),
            Resolution::new(4, 2)
        );
        assert_eq!(
            SimulatedDevice::kinect_v2().coordinate_mapper().depth_resolution(),
            Resolution::new(512, 424)
        );
    }
}
