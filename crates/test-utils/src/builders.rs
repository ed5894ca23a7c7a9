#![allow(dead_code)]

use std::path::{Path, PathBuf};

use trigflow::config::{MergePolicy, ProcessingRequest, RunDirs};
use trigflow::segments::Segment;
use trigflow::types::OutputFormat;

/// Builder for `ProcessingRequest` to simplify test setup.
///
/// Defaults: offline span `[0, 10000)`, one strain channel, the timing
/// triple `chunk=124 / segment=64 / overlap=4`, root+txt outputs, no
/// archiving and no merge skips.
pub struct RequestBuilder {
    req: ProcessingRequest,
}

impl RequestBuilder {
    pub fn new(group: &str, output_dir: &Path) -> Self {
        Self {
            req: ProcessingRequest {
                group: group.to_string(),
                ifo: "H1".to_string(),
                frametype: "H1_HOFT_C00".to_string(),
                channels: vec!["H1:GDS-CALIB_STRAIN".to_string()],
                chunk_duration: 124,
                segment_duration: 64,
                overlap_duration: 4,
                sample_frequency: Some(16384.0),
                frequency_range: Some([4.0, 2048.0]),
                q_range: Some([3.3166, 150.0]),
                mismatch_max: Some(0.2),
                snr_threshold: Some(5.5),
                state: None,
                output_formats: vec![OutputFormat::Root, OutputFormat::Txt],
                max_chunks_per_job: 4,
                max_channels_per_job: 10,
                max_concurrent: 10,
                retry: 2,
                max_rescue_attempts: 0,
                archive: false,
                merge: MergePolicy::default(),
                file_tag: String::new(),
                executable: PathBuf::from("/usr/bin/omicron"),
                dirs: RunDirs::new(output_dir, group),
                span: Some(Segment::new(0, 10_000)),
                use_low_latency_buffer: false,
            },
        }
    }

    pub fn online(mut self) -> Self {
        self.req.span = None;
        self
    }

    pub fn with_span(mut self, start: u64, end: u64) -> Self {
        self.req.span = Some(Segment::new(start, end));
        self
    }

    pub fn with_timing(mut self, chunk: u64, segment: u64, overlap: u64) -> Self {
        self.req.chunk_duration = chunk;
        self.req.segment_duration = segment;
        self.req.overlap_duration = overlap;
        self
    }

    pub fn with_channels(mut self, channels: &[&str]) -> Self {
        self.req.channels = channels.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_formats(mut self, formats: &[OutputFormat]) -> Self {
        self.req.output_formats = formats.to_vec();
        self
    }

    pub fn with_max_chunks_per_job(mut self, n: u64) -> Self {
        self.req.max_chunks_per_job = n;
        self
    }

    pub fn with_max_channels_per_job(mut self, n: usize) -> Self {
        self.req.max_channels_per_job = n;
        self
    }

    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.req.max_concurrent = n;
        self
    }

    pub fn with_max_rescue_attempts(mut self, n: u32) -> Self {
        self.req.max_rescue_attempts = n;
        self
    }

    pub fn with_archive(mut self) -> Self {
        self.req.archive = true;
        self
    }

    pub fn with_merge_policy(mut self, merge: MergePolicy) -> Self {
        self.req.merge = merge;
        self
    }

    pub fn with_file_tag(mut self, tag: &str) -> Self {
        self.req.file_tag = trigflow::config::request::sanitize_tag(tag);
        self
    }

    pub fn with_low_latency_buffer(mut self) -> Self {
        self.req.use_low_latency_buffer = true;
        self
    }

    pub fn build(self) -> ProcessingRequest {
        self.req
    }
}
