// src/segments/mod.rs

//! Time-segment handling.
//!
//! - [`algebra`] holds the closed-open integer-interval primitives
//!   ([`Segment`], [`SegmentList`]) everything else is built on.
//! - [`watermark`] persists the last successfully committed processing span
//!   so online runs can resume without re-scanning history.
//! - [`provider`] abstracts the external data-availability and
//!   state-predicate queries.
//! - [`engine`] combines all of the above into the final list of segments
//!   to process for one run.

pub mod algebra;
pub mod engine;
pub mod provider;
pub mod watermark;

pub use algebra::{Segment, SegmentList};
pub use engine::{determine_segments, Outcome, SegmentPlan};
pub use provider::{DataProvider, FileBackedProvider, RetryingProvider};
pub use watermark::WatermarkStore;
