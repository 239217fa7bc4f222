//! Recorder configuration and the capture-then-dump run.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Local;
use dialoguer::Confirm;
use thiserror::Error;
use tracing::{debug, info};
use tristream_capture::{
    CaptureError, CaptureSession, LatestPreview, QuitSignal, SessionConfig, SimulatedDevice,
    StatusBoard, StreamProfile,
};
use tristream_data::{DEFAULT_FRAMES_PER_SECOND, Modality};
use tristream_persist::{DumpLayout, PersistError, PersistOptions, persist_session};

use crate::estimate;

/// Errors that end a recording run.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("Dump failed: {0}")]
    Persist(#[from] PersistError),

    #[error("Failed to install Ctrl+C handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("Prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),
}

/// Exit status after an interrupt, as a shell reports SIGINT.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// What a Ctrl+C should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// Ask the capture loops to wrap up.
    StopCapture,
    /// Leave the process.
    Exit,
}

/// Ctrl+C policy.
///
/// The first interrupt during capture stops capturing and keeps the frames.
/// A second interrupt, or any interrupt once capture has finished, exits.
#[derive(Debug, Clone)]
pub struct Interrupts {
    quit: QuitSignal,
    capture_done: Arc<AtomicBool>,
}

impl Interrupts {
    pub fn new(quit: QuitSignal) -> Self {
        Self {
            quit,
            capture_done: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn capture_finished(&self) {
        self.capture_done.store(true, Ordering::Release);
    }

    pub fn on_interrupt(&self) -> InterruptAction {
        if self.capture_done.load(Ordering::Acquire) || self.quit.is_requested() {
            return InterruptAction::Exit;
        }
        self.quit.request();
        InterruptAction::StopCapture
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Builder for a recording run.
pub struct Recorder {
    dump_path: PathBuf,
    seconds: u32,
    color_fps: u32,
    dry_run: bool,
    assume_yes: bool,
    verbose: bool,
    logging: LoggingConfig,
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            dump_path: PathBuf::from("dump/"),
            seconds: tristream_capture::DEFAULT_SECONDS_TO_CAPTURE,
            color_fps: DEFAULT_FRAMES_PER_SECOND,
            dry_run: false,
            assume_yes: false,
            verbose: false,
            logging: LoggingConfig::default(),
        }
    }

    pub fn with_dump_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dump_path = path.into();
        self
    }

    pub fn with_seconds(mut self, seconds: u32) -> Self {
        self.seconds = seconds;
        self
    }

    /// Frame rate of the simulated color stream.
    pub fn with_color_fps(mut self, fps: u32) -> Self {
        self.color_fps = fps;
        self
    }

    /// Capture into RAM only.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Skip the confirmation before dumping.
    pub fn with_assume_yes(mut self, yes: bool) -> Self {
        self.assume_yes = yes;
        self
    }

    /// Verbose mode: debug logging and one log line per written file.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        if verbose {
            self.logging.level = "debug".to_string();
        }
        self
    }

    fn session_config(&self) -> SessionConfig {
        SessionConfig::from_seconds(self.seconds, DEFAULT_FRAMES_PER_SECOND)
    }

    fn device(&self) -> SimulatedDevice {
        let mut color = StreamProfile::kinect_v2(Modality::Color);
        color.fps = self.color_fps as f32;
        SimulatedDevice::kinect_v2().with_profile(Modality::Color, color)
    }

    /// Capture a session, then dump it unless this is a dry run.
    pub fn run(self) -> Result<(), AppError> {
        self.init_logging();

        let config = self.session_config();
        let status = StatusBoard::stdout();
        status.report(format!(
            "Capturing up to {} s ({} frames per stream)",
            self.seconds,
            config.capacity()
        ));
        status.report(estimate::ram_line(config.capacity(), config.pool_bytes()));

        let quit = QuitSignal::new();
        let interrupts = Interrupts::new(quit.clone());
        let handler = interrupts.clone();
        ctrlc::set_handler(move || {
            if handler.on_interrupt() == InterruptAction::Exit {
                eprintln!("Interrupted");
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
        })?;

        let device = Arc::new(self.device());
        let depth_preview = LatestPreview::new();
        let infrared_preview = LatestPreview::new();
        let session = CaptureSession::new(Arc::clone(&device), config)
            .with_status(status.clone())
            .with_quit_signal(quit)
            .with_preview(Modality::Depth, Box::new(depth_preview.clone()))
            .with_preview(Modality::Infrared, Box::new(infrared_preview.clone()));

        status.report("Press Ctrl+C to stop capturing early");
        let capture = session.start()?.join()?;
        interrupts.capture_finished();
        status.report("Capture finished; Ctrl+C now exits without dumping");
        for (modality, preview) in [
            (Modality::Depth, &depth_preview),
            (Modality::Infrared, &infrared_preview),
        ] {
            if let Some((index, _)) = preview.latest() {
                debug!(stream = %modality, index, "Last previewed frame");
            }
        }

        if self.dry_run {
            info!("Dry run, nothing written to disk");
            return Ok(());
        }

        let counts = capture.counts();
        let layout = DumpLayout::for_session(&self.dump_path, &Local::now());
        status.report(format!("Dump path: {}", layout.root().display()));
        status.report(estimate::disk_line(counts.depth));

        if !self.assume_yes && !confirm("Dump captured frames to disk?")? {
            status.report(estimate::disk_rate_hint(DEFAULT_FRAMES_PER_SECOND));
            return Ok(());
        }

        status.report("Dumping to disk. This could take a while...");
        let options = PersistOptions {
            verbose: self.verbose,
        };
        let mapper = device.coordinate_mapper();
        let report = persist_session(&capture, &mapper, &layout, &status, options)?;
        info!(
            depth = report.depth,
            infrared = report.infrared,
            color = report.color.frames,
            mapped = report.color.mapped,
            "Dump complete"
        );
        status.report("All done");
        Ok(())
    }

    fn init_logging(&self) {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&self.logging.level)),
            )
            .with_target(false)
            .init();
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

fn confirm(prompt: &str) -> Result<bool, dialoguer::Error> {
    Confirm::new().with_prompt(prompt).default(false).interact()
}
