// src/partition/mod.rs

//! Job partitioner: splits the segment plan into bounded-size work units.
//!
//! The channel list is cut into ordered groups of at most
//! `max_channels_per_job` channels, each owning one parameter file. Every
//! processing segment is cut into sub-spans of at most
//! `max_chunks_per_job * chunk_duration` seconds. One [`WorkUnit`] per
//! (group, sub-span) pairing, carrying the exact output files the
//! processing executable is expected to write, keyed by
//! `(channel, format)`. Everything here is a deterministic function of the
//! request and the plan; the workflow compiler relies on that for rescue
//! recompilation.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use crate::config::ProcessingRequest;
use crate::errors::{Result, TrigflowError};
use crate::segments::{Segment, SegmentPlan};
use crate::types::OutputFormat;

/// A slice of the channel list processed together.
#[derive(Debug, Clone)]
pub struct ChannelGroup {
    pub index: usize,
    pub channels: Vec<String>,
    /// Parameter file consumed by the processing executable for this group.
    pub parameter_file: PathBuf,
}

/// One schedulable unit of processing.
#[derive(Debug, Clone)]
pub struct WorkUnit {
    /// Sub-span this unit processes (includes padding).
    pub span: Segment,
    /// The processing segment this sub-span belongs to.
    pub segment: Segment,
    pub group_index: usize,
    pub parameter_file: PathBuf,
    /// Expected output files, keyed by channel and format. Populated once
    /// here, never mutated afterwards.
    pub outputs: BTreeMap<(String, OutputFormat), Vec<PathBuf>>,
}

/// The full partition of a segment plan.
#[derive(Debug, Clone)]
pub struct Partition {
    pub groups: Vec<ChannelGroup>,
    /// Units ordered segment-major, then by group, then by sub-span start.
    /// This is the workflow compiler's node order.
    pub units: Vec<WorkUnit>,
}

impl Partition {
    /// Units belonging to one (segment, group) pairing, in sub-span order.
    pub fn units_for(&self, segment: Segment, group_index: usize) -> Vec<&WorkUnit> {
        self.units
            .iter()
            .filter(|u| u.segment == segment && u.group_index == group_index)
            .collect()
    }
}

/// Partition the plan into work units.
pub fn partition(req: &ProcessingRequest, plan: &SegmentPlan) -> Result<Partition> {
    let groups = channel_groups(req)?;
    let mut units = Vec::new();

    for segment in &plan.segments {
        let subspans = split_segment(*segment, req.max_chunks_per_job * req.chunk_duration);
        for group in &groups {
            for span in &subspans {
                units.push(WorkUnit {
                    span: *span,
                    segment: *segment,
                    group_index: group.index,
                    parameter_file: group.parameter_file.clone(),
                    outputs: output_files(req, group, *span),
                });
            }
        }
    }

    Ok(Partition { groups, units })
}

/// Split the channel list into ordered groups of at most
/// `max_channels_per_job` channels.
pub fn channel_groups(req: &ProcessingRequest) -> Result<Vec<ChannelGroup>> {
    if req.channels.is_empty() {
        return Err(TrigflowError::EmptyChannelGroup { index: 0 });
    }
    let size = req.max_channels_per_job.max(1);

    Ok(req
        .channels
        .chunks(size)
        .enumerate()
        .map(|(index, channels)| ChannelGroup {
            index,
            channels: channels.to_vec(),
            parameter_file: req.dirs.parameters.join(format!("parameters-{index}.txt")),
        })
        .collect())
}

/// Split a segment into sub-spans of at most `max_span` seconds. The last
/// sub-span may be shorter, but never zero-length.
pub fn split_segment(segment: Segment, max_span: u64) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut cursor = segment.start;
    while cursor < segment.end {
        let end = (cursor + max_span).min(segment.end);
        out.push(Segment::new(cursor, end));
        cursor = end;
    }
    out
}

/// Expected output files for one group over one sub-span: one file per
/// chunk, per channel, per enabled format.
fn output_files(
    req: &ProcessingRequest,
    group: &ChannelGroup,
    span: Segment,
) -> BTreeMap<(String, OutputFormat), Vec<PathBuf>> {
    let tag = req.trigger_tag();
    let mut outputs = BTreeMap::new();

    for channel in &group.channels {
        let dir = req.dirs.triggers.join(sanitize_channel(channel));
        for format in &req.output_formats {
            let files = chunk_spans(span, req.chunk_duration, req.overlap_duration)
                .into_iter()
                .map(|c| {
                    dir.join(format!(
                        "{}_{}-{}-{}.{}",
                        sanitize_channel(channel),
                        tag,
                        c.start,
                        c.duration(),
                        format.extension()
                    ))
                })
                .collect();
            outputs.insert((channel.clone(), *format), files);
        }
    }
    outputs
}

/// Chunk progression within a sub-span: `chunk_duration`-long blocks
/// stepping by `chunk - overlap`, with the last block clipped at the end.
fn chunk_spans(span: Segment, chunk: u64, overlap: u64) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut cursor = span.start;
    loop {
        let end = (cursor + chunk).min(span.end);
        out.push(Segment::new(cursor, end));
        if end == span.end {
            break;
        }
        cursor += chunk - overlap;
    }
    out
}

/// Filesystem-safe channel name: `H1:GDS-CALIB_STRAIN` becomes
/// `H1-GDS_CALIB_STRAIN`.
pub fn sanitize_channel(channel: &str) -> String {
    match channel.split_once(':') {
        Some((ifo, body)) => format!("{}-{}", ifo, body.replace('-', "_")),
        None => channel.replace('-', "_"),
    }
}

/// Render the parameter file for one channel group.
///
/// The processing executable consumes this directly; the format is a fixed
/// keyword table.
pub fn render_parameter_file(req: &ProcessingRequest, group: &ChannelGroup) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "DATA\tFFL\t{}", req.dirs.cache.join("frames.lcf").display());
    let _ = writeln!(out, "DATA\tCHANNELS\t{}", group.channels.join(" "));
    if let Some(rate) = req.sample_frequency {
        let _ = writeln!(out, "DATA\tSAMPLEFREQUENCY\t{rate}");
    }
    let _ = writeln!(
        out,
        "PARAMETER\tTIMING\t{} {} {}",
        req.chunk_duration, req.segment_duration, req.overlap_duration
    );
    if let Some([lo, hi]) = req.frequency_range {
        let _ = writeln!(out, "PARAMETER\tFREQUENCYRANGE\t{lo} {hi}");
    }
    if let Some([lo, hi]) = req.q_range {
        let _ = writeln!(out, "PARAMETER\tQRANGE\t{lo} {hi}");
    }
    if let Some(mismatch) = req.mismatch_max {
        let _ = writeln!(out, "PARAMETER\tMISMATCHMAX\t{mismatch}");
    }
    if let Some(snr) = req.snr_threshold {
        let _ = writeln!(out, "PARAMETER\tSNRTHRESHOLD\t{snr}");
    }
    let _ = writeln!(out, "OUTPUT\tDIRECTORY\t{}", req.dirs.triggers.display());
    let formats: Vec<&str> = req.output_formats.iter().map(|f| f.as_str()).collect();
    let _ = writeln!(out, "OUTPUT\tFORMAT\t{}", formats.join(" "));
    out
}
