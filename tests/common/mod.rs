// tests/common/mod.rs

#![allow(dead_code)]

pub use trigflow_test_utils::init_tracing;

use trigflow::segments::{Outcome, SegmentPlan};

/// Unwrap a `Ready` outcome, panicking with the actual variant otherwise.
pub fn ready(outcome: Outcome) -> SegmentPlan {
    match outcome {
        Outcome::Ready(plan) => plan,
        other => panic!("expected Ready, got {other:?}"),
    }
}
