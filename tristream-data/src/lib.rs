//! Tristream Data Crate
//!
//! Storage and bookkeeping for three-stream capture sessions: stream geometry,
//! preallocated frame pools and the color-to-depth timestamp correspondence.
//! This crate has no notion of hardware; capture and persistence build on it.

pub mod correspondence;
pub mod pool;
pub mod types;

pub use correspondence::{DepthMatch, MatchKind, correspondence_map, nearest_preceding_depth};
pub use pool::{FramePool, FrameRef, PoolError};
pub use types::{
    DEFAULT_FRAMES_PER_SECOND, Modality, Resolution, TICKS_PER_MS, TICKS_PER_US, Ticks,
    frames_for_duration,
};
