// src/segments/provider.rs

//! External data-availability and state-predicate queries.
//!
//! The segment engine only ever talks to the [`DataProvider`] trait; the
//! production implementation reads a frame-cache listing and an optional
//! state-segment file, and tests substitute an in-memory fake. A
//! [`RetryingProvider`] wrapper retries transient failures exactly once
//! with a short fixed backoff.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::{Result, TrigflowError};
use crate::segments::{Segment, SegmentList};

/// Abstract source of availability and state information.
pub trait DataProvider {
    /// GPS time of the most recent available data.
    fn latest_data_time(&self) -> Result<u64>;

    /// Segments for which source data exists, restricted to `span`.
    fn available_segments(&self, span: Segment) -> Result<SegmentList>;

    /// Segments satisfying the good-state predicate, restricted to `span`.
    /// `Ok(None)` means no predicate is configured and all available time
    /// is usable.
    fn state_segments(&self, span: Segment) -> Result<Option<SegmentList>>;
}

/// Delay between the first failed query and its single retry.
const RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Wrapper retrying each query once on `DataUnavailable` or IO failure.
pub struct RetryingProvider<P> {
    inner: P,
}

impl<P: DataProvider> RetryingProvider<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    fn retry_once<T>(&self, what: &str, f: impl Fn() -> Result<T>) -> Result<T> {
        match f() {
            Ok(v) => Ok(v),
            Err(e @ (TrigflowError::DataUnavailable(_) | TrigflowError::IoError(_))) => {
                warn!(query = what, error = %e, "data query failed, retrying once");
                std::thread::sleep(RETRY_BACKOFF);
                f()
            }
            Err(e) => Err(e),
        }
    }
}

impl<P: DataProvider> DataProvider for RetryingProvider<P> {
    fn latest_data_time(&self) -> Result<u64> {
        self.retry_once("latest_data_time", || self.inner.latest_data_time())
    }

    fn available_segments(&self, span: Segment) -> Result<SegmentList> {
        self.retry_once("available_segments", || self.inner.available_segments(span))
    }

    fn state_segments(&self, span: Segment) -> Result<Option<SegmentList>> {
        self.retry_once("state_segments", || self.inner.state_segments(span))
    }
}

/// Production provider backed by plain files.
///
/// Availability comes from a LAL-cache-style listing
/// (`OBS TYPE START DURATION PATH` per line); the state predicate, when a
/// segment file is configured, from the `start end` per-line format.
pub struct FileBackedProvider {
    cache_path: PathBuf,
    state_path: Option<PathBuf>,
}

impl FileBackedProvider {
    pub fn new(cache_path: impl Into<PathBuf>, state_path: Option<PathBuf>) -> Self {
        Self {
            cache_path: cache_path.into(),
            state_path,
        }
    }

    fn cache_segments(&self) -> Result<SegmentList> {
        let text = fs::read_to_string(&self.cache_path).map_err(|e| {
            TrigflowError::DataUnavailable(format!(
                "cannot read frame cache {}: {e}",
                self.cache_path.display()
            ))
        })?;

        let mut list = SegmentList::new();
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 5 {
                return Err(TrigflowError::DataUnavailable(format!(
                    "{}: line {}: expected 'obs type start duration path'",
                    self.cache_path.display(),
                    n + 1
                )));
            }
            let start: u64 = fields[2].parse().map_err(|e| {
                TrigflowError::DataUnavailable(format!(
                    "{}: line {}: bad start: {e}",
                    self.cache_path.display(),
                    n + 1
                ))
            })?;
            let duration: u64 = fields[3].parse().map_err(|e| {
                TrigflowError::DataUnavailable(format!(
                    "{}: line {}: bad duration: {e}",
                    self.cache_path.display(),
                    n + 1
                ))
            })?;
            list.insert(Segment::new(start, start + duration));
        }
        debug!(
            frames = %self.cache_path.display(),
            segments = list.len(),
            "frame cache read"
        );
        Ok(list)
    }
}

impl DataProvider for FileBackedProvider {
    fn latest_data_time(&self) -> Result<u64> {
        self.cache_segments()?
            .last()
            .map(|s| s.end)
            .ok_or_else(|| {
                TrigflowError::DataUnavailable(format!(
                    "frame cache {} lists no frames",
                    self.cache_path.display()
                ))
            })
    }

    fn available_segments(&self, span: Segment) -> Result<SegmentList> {
        let span_list: SegmentList = std::iter::once(span).collect();
        Ok(self.cache_segments()?.intersect(&span_list))
    }

    fn state_segments(&self, span: Segment) -> Result<Option<SegmentList>> {
        let Some(path) = self.state_path.as_ref() else {
            return Ok(None);
        };
        let text = fs::read_to_string(path).map_err(|e| {
            TrigflowError::DataUnavailable(format!(
                "cannot read state segments {}: {e}",
                path.display()
            ))
        })?;
        let list = SegmentList::parse_text(&text).map_err(|e| {
            TrigflowError::DataUnavailable(format!("{}: {e}", path.display()))
        })?;
        let span_list: SegmentList = std::iter::once(span).collect();
        Ok(Some(list.intersect(&span_list)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_cache(dir: &std::path::Path, lines: &[&str]) -> PathBuf {
        let path = dir.join("frames.lcf");
        let mut f = fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(f, "{line}").unwrap();
        }
        path
    }

    #[test]
    fn cache_file_availability() {
        let dir = tempdir().unwrap();
        let cache = write_cache(
            dir.path(),
            &[
                "H H1_HOFT_C00 1000 500 /frames/a.gwf",
                "H H1_HOFT_C00 1500 500 /frames/b.gwf",
            ],
        );
        let provider = FileBackedProvider::new(cache, None);

        assert_eq!(provider.latest_data_time().unwrap(), 2000);
        let avail = provider.available_segments(Segment::new(900, 1800)).unwrap();
        let segs: Vec<_> = avail.iter().copied().collect();
        assert_eq!(segs, vec![Segment::new(1000, 1800)]);
    }

    #[test]
    fn missing_cache_is_data_unavailable() {
        let provider = FileBackedProvider::new("/nonexistent/frames.lcf", None);
        assert!(matches!(
            provider.latest_data_time(),
            Err(TrigflowError::DataUnavailable(_))
        ));
    }

    #[test]
    fn state_segments_restricted_to_span() {
        let dir = tempdir().unwrap();
        let cache = write_cache(dir.path(), &["H H1_HOFT_C00 0 4000 /frames/a.gwf"]);
        let state = dir.path().join("state.txt");
        fs::write(&state, "100 900\n2000 3000\n").unwrap();

        let provider = FileBackedProvider::new(cache, Some(state));
        let segs = provider
            .state_segments(Segment::new(500, 2500))
            .unwrap()
            .unwrap();
        let got: Vec<_> = segs.iter().copied().collect();
        assert_eq!(got, vec![Segment::new(500, 900), Segment::new(2000, 2500)]);
    }

    #[test]
    fn no_state_file_means_no_predicate() {
        let dir = tempdir().unwrap();
        let cache = write_cache(dir.path(), &["H H1_HOFT_C00 0 100 /frames/a.gwf"]);
        let provider = FileBackedProvider::new(cache, None);
        assert!(provider
            .state_segments(Segment::new(0, 100))
            .unwrap()
            .is_none());
    }
}
