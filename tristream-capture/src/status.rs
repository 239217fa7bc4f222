//! Shared status output and the session termination flag.

use std::fmt::Display;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

enum Target {
    Stdout,
    Memory(Vec<u8>),
}

/// Mutex-guarded sink for user-facing status lines.
///
/// Capture and writer threads report through the same board so that their
/// lines never interleave mid-line.
#[derive(Clone)]
pub struct StatusBoard {
    target: Arc<Mutex<Target>>,
}

impl StatusBoard {
    /// Status lines go to standard output.
    pub fn stdout() -> Self {
        Self {
            target: Arc::new(Mutex::new(Target::Stdout)),
        }
    }

    /// Status lines are kept in memory; see [`lines`](Self::lines).
    pub fn in_memory() -> Self {
        Self {
            target: Arc::new(Mutex::new(Target::Memory(Vec::new()))),
        }
    }

    /// Print one status line.
    pub fn report(&self, line: impl Display) {
        let line = line.to_string();
        debug!("{line}");
        let mut target = self.target.lock().unwrap_or_else(PoisonError::into_inner);
        match &mut *target {
            Target::Stdout => {
                let mut out = std::io::stdout().lock();
                // A closed stdout is not worth failing a capture over.
                let _ = writeln!(out, "{line}");
                let _ = out.flush();
            }
            Target::Memory(buf) => {
                buf.extend_from_slice(line.as_bytes());
                buf.push(b'\n');
            }
        }
    }

    /// Lines reported so far, for in-memory boards.
    pub fn lines(&self) -> Vec<String> {
        let target = self.target.lock().unwrap_or_else(PoisonError::into_inner);
        match &*target {
            Target::Stdout => Vec::new(),
            Target::Memory(buf) => String::from_utf8_lossy(buf)
                .lines()
                .map(str::to_owned)
                .collect(),
        }
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::stdout()
    }
}

impl std::fmt::Debug for StatusBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusBoard").finish_non_exhaustive()
    }
}

/// Session-wide termination flag.
///
/// Policy: the first stream to finish, for any reason, stops the whole
/// session. Every capture loop raises the flag when it exits and checks it at
/// the top of each iteration, so the remaining streams stop at their next
/// check rather than running on to their own capacity.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Guard that raises the flag when dropped, including on unwind.
    pub fn stop_on_drop(&self) -> StopOnDrop {
        StopOnDrop(self.clone())
    }
}

/// Raises the session's [`StopSignal`] when dropped.
#[derive(Debug)]
pub struct StopOnDrop(StopSignal);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.request_stop();
    }
}
