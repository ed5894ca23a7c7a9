// src/segments/watermark.rs

//! Durable record of the last committed processing span.
//!
//! One plain-text file per processing group, holding a single `start end`
//! line. The file is written only after a run's workflow has been
//! irrevocably handed to the execution service, so a crash before
//! submission leaves it untouched and the next run repeats the attempt.
//! The format is deliberately human-inspectable and hand-editable.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::{Result, TrigflowError};
use crate::segments::Segment;

#[derive(Debug, Clone)]
pub struct WatermarkStore {
    path: PathBuf,
}

impl WatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the recorded span. `Ok(None)` when no record exists yet.
    pub fn read(&self) -> Result<Option<Segment>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)?;
        let list = crate::segments::SegmentList::parse_text(&text).map_err(|e| {
            TrigflowError::ConfigError(format!(
                "malformed watermark file {}: {e}",
                self.path.display()
            ))
        })?;
        // The record is a single span; a multi-line file (hand-edited or
        // from an older layout) resolves to its extent.
        Ok(list.extent())
    }

    /// Overwrite the record with `span`.
    pub fn write(&self, span: Segment) -> Result<()> {
        let mut f = fs::File::create(&self.path)?;
        writeln!(f, "{} {}", span.start, span.end)?;
        debug!(path = %self.path.display(), %span, "watermark written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn read_missing_is_none() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path().join("segments.txt"));
        assert_eq!(store.read().unwrap(), None);
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path().join("segments.txt"));
        store.write(Segment::new(1000, 2000)).unwrap();
        assert_eq!(store.read().unwrap(), Some(Segment::new(1000, 2000)));
    }

    #[test]
    fn overwrite_replaces_record() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path().join("segments.txt"));
        store.write(Segment::new(1000, 2000)).unwrap();
        store.write(Segment::new(2000, 3000)).unwrap();
        assert_eq!(store.read().unwrap(), Some(Segment::new(2000, 3000)));
    }

    #[test]
    fn multi_line_record_reads_as_extent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("segments.txt");
        std::fs::write(&path, "1000 1500\n1600 2000\n").unwrap();
        let store = WatermarkStore::new(path);
        assert_eq!(store.read().unwrap(), Some(Segment::new(1000, 2000)));
    }

    #[test]
    fn malformed_record_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("segments.txt");
        std::fs::write(&path, "not a segment\n").unwrap();
        let store = WatermarkStore::new(path);
        assert!(store.read().is_err());
    }
}
