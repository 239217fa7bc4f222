//! Tristream Persist Crate
//!
//! Turns a finished [`SessionCapture`](tristream_capture::SessionCapture) into
//! files: one image per frame plus a tab-separated timestamp table per stream.
//! Color frames are additionally decoded and, where a depth frame precedes
//! them, re-projected into depth space.

mod layout;
mod timetable;
mod writer;

use std::path::PathBuf;

use thiserror::Error;
use tristream_color::{ColorError, MappingError};
use tristream_data::Modality;

pub use layout::{Artifact, DumpLayout, SESSION_DIR_FORMAT, session_dir_name};
pub use timetable::{TIMES_HEADER, TimeTable};
pub use writer::{
    ColorWritten, PersistOptions, PersistReport, persist_session, write_color_stream,
    write_gray16_stream,
};

/// Errors that can occur while persisting a session.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Failed to create directory {}: {source}", path.display())]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Color decode error: {0}")]
    Color(#[from] ColorError),

    #[error("Coordinate mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("{0} writer thread panicked")]
    ThreadPanicked(Modality),
}
