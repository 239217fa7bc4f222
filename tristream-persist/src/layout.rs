//! File naming inside a session dump directory.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use tristream_data::Modality;

use crate::PersistError;

/// `strftime` pattern of a session directory name.
pub const SESSION_DIR_FORMAT: &str = "%Y-%m-%d_%H%M%S";

/// Name of the directory a session started at `started` is dumped into.
pub fn session_dir_name<Tz>(started: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    started.format(SESSION_DIR_FORMAT).to_string()
}

/// Kinds of per-frame files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    Depth,
    Infrared,
    Yuyv,
    Gray,
    Rgb,
    GrayMapped,
    RgbMapped,
}

impl Artifact {
    /// Raw-sample artifact of a 16-bit stream.
    pub fn raw(modality: Modality) -> Self {
        match modality {
            Modality::Depth => Artifact::Depth,
            Modality::Infrared => Artifact::Infrared,
            Modality::Color => Artifact::Yuyv,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            Artifact::Depth => "depth",
            Artifact::Infrared => "infra",
            Artifact::Yuyv => "yuyv",
            Artifact::Gray => "gray",
            Artifact::Rgb => "rgb",
            Artifact::GrayMapped => "grayMapped",
            Artifact::RgbMapped => "rgbMapped",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Artifact::Yuyv => "yuv",
            _ => "tiff",
        }
    }

    /// File name of frame `index`, e.g. `depth00000042.tiff`.
    pub fn file_name(&self, index: usize) -> String {
        format!("{}{:08}.{}", self.prefix(), index, self.extension())
    }
}

/// Where the files of one session go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpLayout {
    root: PathBuf,
}

impl DumpLayout {
    /// Dump straight into `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Dump into a timestamped subdirectory of `dump_path`.
    pub fn for_session<Tz>(dump_path: impl AsRef<Path>, started: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        Self::new(dump_path.as_ref().join(session_dir_name(started)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the dump directory and any missing parents.
    pub fn create(&self) -> Result<(), PersistError> {
        std::fs::create_dir_all(&self.root).map_err(|e| PersistError::CreateDirectory {
            path: self.root.clone(),
            source: e,
        })
    }

    pub fn frame_path(&self, artifact: Artifact, index: usize) -> PathBuf {
        self.root.join(artifact.file_name(index))
    }

    /// Timestamp table of a stream, e.g. `depth_times.txt`.
    pub fn times_path(&self, modality: Modality) -> PathBuf {
        self.root.join(format!("{}_times.txt", modality.name()))
    }
}
