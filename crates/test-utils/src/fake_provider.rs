#![allow(dead_code)]

use trigflow::errors::{Result, TrigflowError};
use trigflow::segments::{DataProvider, Segment, SegmentList};

/// In-memory `DataProvider` for engine tests.
///
/// Availability and state are fixed lists; queries restrict them to the
/// requested span like the production provider does.
pub struct FakeDataProvider {
    latest: u64,
    available: SegmentList,
    state: Option<SegmentList>,
    unavailable: bool,
}

impl FakeDataProvider {
    pub fn new(latest: u64) -> Self {
        Self {
            latest,
            available: SegmentList::new(),
            state: None,
            unavailable: false,
        }
    }

    pub fn with_available(mut self, start: u64, end: u64) -> Self {
        self.available.insert(Segment::new(start, end));
        self
    }

    pub fn with_state(mut self, segments: &[(u64, u64)]) -> Self {
        let list = segments
            .iter()
            .map(|&(s, e)| Segment::new(s, e))
            .collect();
        self.state = Some(list);
        self
    }

    /// Make every query fail with `DataUnavailable`.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    fn check(&self) -> Result<()> {
        if self.unavailable {
            return Err(TrigflowError::DataUnavailable(
                "fake provider configured unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

impl DataProvider for FakeDataProvider {
    fn latest_data_time(&self) -> Result<u64> {
        self.check()?;
        Ok(self.latest)
    }

    fn available_segments(&self, span: Segment) -> Result<SegmentList> {
        self.check()?;
        let window: SegmentList = [span].into_iter().collect();
        Ok(self.available.intersect(&window))
    }

    fn state_segments(&self, span: Segment) -> Result<Option<SegmentList>> {
        self.check()?;
        let window: SegmentList = [span].into_iter().collect();
        Ok(self.state.as_ref().map(|s| s.intersect(&window)))
    }
}
