// src/segments/engine.rs

//! Segment engine: decides which time ranges of the source are eligible
//! for processing in this run.
//!
//! Combines the requested span (explicit in offline mode, derived from the
//! watermark and the live data edge in online mode) with data availability
//! and the good-state predicate, applying padding, end-of-data truncation,
//! day-boundary splitting and the minimum-duration rule. Synchronous and
//! side-effect-free; the only external calls go through [`DataProvider`].

use tracing::{debug, info};

use crate::config::ProcessingRequest;
use crate::errors::{Result, TrigflowError};
use crate::segments::{DataProvider, Segment, SegmentList};
use crate::types::RunMode;

/// Fixed lookback for an online run with no watermark record, in seconds.
const ONLINE_LOOKBACK: u64 = 4000;

/// Downstream file naming groups triggers by metric day; segments must not
/// straddle a multiple of this.
const METRIC_DAY: u64 = 100_000;

/// Segment decision for one run.
#[derive(Debug, Clone)]
pub struct SegmentPlan {
    /// Padded processing segments, in time order. Adjacent segments may
    /// touch where a day boundary forced a split.
    pub segments: Vec<Segment>,
    /// Processing segments contracted inward by the padding; these are the
    /// time ranges triggers will be reported for.
    pub trigger_segments: SegmentList,
    /// Extent of the trigger segments; recorded as the watermark after
    /// submission.
    pub extent: Segment,
    /// The padded span the data was searched over, after any truncation.
    pub data_span: Segment,
}

/// Result of segment determination.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Segments are ready for partitioning.
    Ready(SegmentPlan),
    /// Online no-op: nothing to do yet, try again later. No error, no
    /// watermark update.
    RetryLater { reason: String },
    /// Online: data fully covers the requested span but no segment passed
    /// the state predicate. Advance the watermark to `span` so these data
    /// are not searched again.
    CaughtUp { span: Segment },
}

/// Determine the segments to process for one run.
///
/// `watermark` is the previously recorded span, if any. `fresh` is false
/// when recompiling for rescue or reattach, in which case the watermark
/// span is reused verbatim and no end-of-data truncation is applied.
pub fn determine_segments(
    req: &ProcessingRequest,
    provider: &dyn DataProvider,
    watermark: Option<Segment>,
    fresh: bool,
) -> Result<Outcome> {
    let online = req.mode().is_online();
    let padding = req.padding();
    let chunk = req.chunk_duration;

    let (start, end) = nominal_span(req, provider, watermark, fresh)?;
    let data_start = start.saturating_sub(padding);
    let data_end = end + padding;
    // An online watermark can sit ahead of the live data edge (the frame
    // listing regressed since the last submission), leaving an empty
    // nominal span.
    let data_duration = data_end.saturating_sub(data_start);

    // Minimum allowed duration is one full chunk.
    if data_duration < chunk {
        if online {
            return Ok(Outcome::RetryLater {
                reason: format!("span is too short ({data_duration} < {chunk})"),
            });
        }
        return Err(TrigflowError::SpanTooShort {
            span: Segment::new(start, end),
            duration: data_duration,
            minimum: chunk,
        });
    }

    let query_span = Segment::new(data_start, data_end);
    info!(
        group = %req.group,
        span = %query_span,
        duration = data_duration,
        "processing span determined"
    );
    let availability = provider.available_segments(query_span)?;
    let mut segs = match provider.state_segments(query_span)? {
        Some(state) => state,
        None => availability.clone(),
    };
    if !segs.is_empty() {
        info!(
            segments = segs.len(),
            duration = segs.total_duration(),
            "state/frame segments recovered"
        );
    }

    // When running online we avoid processing up to the live edge of
    // available data, so the next run is not left with a trailing segment
    // too short to process (a lock loss or a missing frame shortly after
    // this run would otherwise strand it).
    let mut data_end = data_end;
    if online && fresh {
        if let Some(&last) = segs.last() {
            if last.end == data_end {
                let (truncated, new_end) =
                    truncate_trailing(&segs, last, chunk, padding, req.overlap_duration);
                segs = truncated;
                data_end = new_end;
            }
        }
    }

    let data_span = Segment::new(data_start, data_end);
    let span_list: SegmentList = std::iter::once(data_span).collect();

    // Restrict the analysis to available data.
    let avail_in_span = availability.intersect(&span_list);
    let all_data = avail_in_span
        .last()
        .map(|s| s.end >= data_end)
        .unwrap_or(false);
    if !segs.subtract(&avail_in_span).is_empty() {
        tracing::warn!("not all state times are available in the source data");
    }
    let segs = avail_in_span.intersect(&segs);

    // Split at metric-day boundaries, then apply the minimum duration.
    let segments: Vec<Segment> = segs
        .iter()
        .flat_map(|s| split_at_day_boundaries(*s))
        .filter(|s| s.duration() >= req.segment_duration)
        .collect();

    if segments.is_empty() {
        if online && fresh && all_data {
            // Everything is available but nothing is analysable; record the
            // covered span so these data are not searched again.
            if let Some(span) = avail_in_span.extent() {
                info!(%span, "no analysable segments but data are up to date, advancing watermark");
                return Ok(Outcome::CaughtUp { span });
            }
        }
        if online {
            return Ok(Outcome::RetryLater {
                reason: "no analysable segments found".to_string(),
            });
        }
        return Err(TrigflowError::NoAnalysableData(data_span));
    }

    let trigger_segments: SegmentList = segments
        .iter()
        .filter_map(|s| s.contract(padding))
        .collect();
    let extent = match trigger_segments.extent() {
        Some(extent) => extent,
        None => return Err(TrigflowError::NoAnalysableData(data_span)),
    };

    for seg in &segments {
        debug!(segment = %seg, duration = seg.duration(), "selected for processing");
    }
    info!(
        segments = segments.len(),
        triggers = %trigger_segments,
        "final data segments selected"
    );

    Ok(Outcome::Ready(SegmentPlan {
        segments,
        trigger_segments,
        extent,
        data_span,
    }))
}

/// Work out the nominal `[start, end)` span before padding.
fn nominal_span(
    req: &ProcessingRequest,
    provider: &dyn DataProvider,
    watermark: Option<Segment>,
    fresh: bool,
) -> Result<(u64, u64)> {
    match (req.mode(), fresh) {
        (RunMode::Offline, _) => {
            // Presence of the span is what makes the mode offline.
            let span = req.span.ok_or_else(|| {
                TrigflowError::ConfigError("offline mode without a GPS span".to_string())
            })?;
            Ok((span.start, span.end))
        }
        (RunMode::Online, true) => {
            let padding = req.padding();
            let end = provider.latest_data_time()?.saturating_sub(padding);
            let start = match watermark {
                Some(w) => {
                    debug!(resume = w.end, "online watermark recovered");
                    w.end
                }
                None if req.use_low_latency_buffer => {
                    debug!(chunk = req.chunk_duration, "no watermark, starting with one chunk");
                    (end + padding).saturating_sub(req.chunk_duration)
                }
                None => {
                    debug!(lookback = ONLINE_LOOKBACK, "no watermark, using fixed lookback");
                    end.saturating_sub(ONLINE_LOOKBACK)
                }
            };
            Ok((start, end))
        }
        (RunMode::Online, false) => {
            // Rescue/reattach reuses the span the original workflow was
            // compiled for, so topology matches.
            let w = watermark
                .ok_or_else(|| TrigflowError::NoWatermarkAndNoFallback(req.group.clone()))?;
            Ok((w.start, w.end))
        }
    }
}

/// End-of-data truncation of the trailing segment.
///
/// Returns the updated segment list and the new data end.
fn truncate_trailing(
    segs: &SegmentList,
    last: Segment,
    chunk: u64,
    padding: u64,
    overlap: u64,
) -> (SegmentList, u64) {
    let head: SegmentList = segs
        .iter()
        .copied()
        .filter(|s| *s != last)
        .collect();

    if last.duration() < 2 * chunk {
        info!(
            segment = %last,
            "final segment is too short but ends at the limit of available data; \
             removing it so it can be processed once closed or long enough"
        );
        return (head, last.start);
    }

    // Remove one trailing chunk, then step down to an integer number of
    // chunks so PSD estimation always sees a consistent block count.
    let e = last.end - (chunk + padding);
    let mut t = last.start;
    let mut step = chunk;
    while t + chunk <= e {
        t += step;
        step = chunk - overlap;
    }
    info!(
        segment = %last,
        new_end = t,
        "final segment touches the limit of available data; trailing chunk removed"
    );

    let mut out = head;
    out.insert(Segment::new(last.start, t));
    (out, t)
}

/// Split a segment at every multiple of [`METRIC_DAY`] it crosses.
fn split_at_day_boundaries(seg: Segment) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut cursor = seg.start;
    let mut boundary = (seg.start / METRIC_DAY + 1) * METRIC_DAY;
    while boundary < seg.end {
        out.push(Segment::new(cursor, boundary));
        cursor = boundary;
        boundary += METRIC_DAY;
    }
    out.push(Segment::new(cursor, seg.end));
    out
}
