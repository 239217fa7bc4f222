//! Tab-separated frame index / timestamp tables.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tristream_data::Ticks;

use crate::PersistError;

/// First line of every table.
pub const TIMES_HEADER: &str = "frame_idx\tRelativeTime";

/// One row per written frame: `index<TAB>ticks`.
#[derive(Debug)]
pub struct TimeTable<W: Write> {
    out: W,
    rows: usize,
}

impl TimeTable<BufWriter<File>> {
    /// Create the table file at `path` and write the header.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let path = path.as_ref();
        let write_err = |e| PersistError::WriteFile {
            path: PathBuf::from(path),
            source: e,
        };
        let file = File::create(path).map_err(write_err)?;
        Self::new(BufWriter::new(file)).map_err(write_err)
    }
}

impl<W: Write> TimeTable<W> {
    pub fn new(mut out: W) -> io::Result<Self> {
        writeln!(out, "{TIMES_HEADER}")?;
        Ok(Self { out, rows: 0 })
    }

    pub fn push(&mut self, index: usize, timestamp: Ticks) -> io::Result<()> {
        writeln!(self.out, "{index}\t{timestamp}")?;
        self.rows += 1;
        Ok(())
    }

    /// Rows written so far, not counting the header.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_follow_header() {
        let mut table = TimeTable::new(Vec::new()).unwrap();
        table.push(0, Ticks::new(1_000)).unwrap();
        table.push(1, Ticks::new(334_333)).unwrap();
        assert_eq!(table.rows(), 2);

        let text = String::from_utf8(table.finish().unwrap()).unwrap();
        assert_eq!(text, "frame_idx\tRelativeTime\n0\t1000\n1\t334333\n");
    }

    #[test]
    fn test_empty_table_has_header_only() {
        let table = TimeTable::new(Vec::new()).unwrap();
        let text = String::from_utf8(table.finish().unwrap()).unwrap();
        assert_eq!(text, "frame_idx\tRelativeTime\n");
    }

    #[test]
    fn test_create_in_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = TimeTable::create(dir.path().join("missing").join("depth_times.txt"));
        assert!(matches!(result, Err(PersistError::WriteFile { .. })));
    }
}
