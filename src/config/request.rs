// src/config/request.rs

//! Per-run immutable processing request.
//!
//! A [`ProcessingRequest`] is assembled once, at startup, from one
//! `[group.<name>]` config section plus command-line arguments, and is then
//! passed by reference through the segment engine, the partitioner and the
//! workflow compiler. Nothing mutates it after assembly.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::debug;

use crate::cli::CliArgs;
use crate::config::model::{ConfigFile, GroupConfig};
use crate::errors::{Result, TrigflowError};
use crate::segments::Segment;
use crate::types::{OutputFormat, RunMode};

/// Good-state predicate: segments are only analysable where this holds.
#[derive(Debug, Clone)]
pub struct StatePredicate {
    /// Segment-database flag, e.g. "H1:DMT-CALIBRATED:1".
    pub flag: Option<String>,
    /// State channel read directly from frames.
    pub channel: Option<String>,
    /// Frametype holding the state channel.
    pub frametype: Option<String>,
    /// Bits that must be set in the state channel.
    pub bits: Vec<u32>,
    /// `(pre, post)` padding applied to state segments.
    pub padding: (i64, i64),
}

/// Which post-processing stages are disabled for this run.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergePolicy {
    pub skip_processing: bool,
    pub skip_root_merge: bool,
    pub skip_hdf5_merge: bool,
    pub skip_xml_merge: bool,
    pub skip_gzip: bool,
    pub skip_rm: bool,
}

impl MergePolicy {
    /// Whether the merge for `format` is disabled. The format's files still
    /// flow to later stages untouched.
    pub fn merge_skipped(&self, format: OutputFormat) -> bool {
        match format {
            OutputFormat::Root => self.skip_root_merge,
            OutputFormat::Hdf5 => self.skip_hdf5_merge,
            OutputFormat::Xml => self.skip_xml_merge,
            // txt files are never merged, only archived.
            OutputFormat::Txt => true,
        }
    }
}

/// Working directories for one run, all under `<output-dir>/<group>`.
#[derive(Debug, Clone)]
pub struct RunDirs {
    pub root: PathBuf,
    pub cache: PathBuf,
    pub condor: PathBuf,
    pub logs: PathBuf,
    pub parameters: PathBuf,
    pub triggers: PathBuf,
    pub merge: PathBuf,
}

impl RunDirs {
    pub fn new(output_dir: &std::path::Path, group: &str) -> Self {
        let root = output_dir.join(group);
        Self {
            cache: root.join("cache"),
            condor: root.join("condor"),
            logs: root.join("logs"),
            parameters: root.join("parameters"),
            triggers: root.join("triggers"),
            merge: root.join("merge"),
            root,
        }
    }

    pub fn subdirs(&self) -> [&PathBuf; 6] {
        [
            &self.cache,
            &self.condor,
            &self.logs,
            &self.parameters,
            &self.triggers,
            &self.merge,
        ]
    }

    /// Create the run directory tree.
    pub fn create(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        for d in self.subdirs() {
            std::fs::create_dir_all(d)?;
        }
        Ok(())
    }

    /// Path of the watermark record for this run's group.
    pub fn watermark_file(&self) -> PathBuf {
        self.root.join("segments.txt")
    }

    /// Path of the workflow description handed to the execution service.
    pub fn dag_file(&self, group: &str) -> PathBuf {
        self.condor.join(format!("trigflow-{group}.dag"))
    }
}

/// Immutable per-run configuration (spec: ProcessingRequest).
#[derive(Debug, Clone)]
pub struct ProcessingRequest {
    pub group: String,
    pub ifo: String,
    pub frametype: String,
    /// Channels to process, after `--exclude-channel` filtering. Order is
    /// load order and determines workflow topology.
    pub channels: Vec<String>,

    pub chunk_duration: u64,
    pub segment_duration: u64,
    pub overlap_duration: u64,

    pub sample_frequency: Option<f64>,
    pub frequency_range: Option<[f64; 2]>,
    pub q_range: Option<[f64; 2]>,
    pub mismatch_max: Option<f64>,
    pub snr_threshold: Option<f64>,

    pub state: Option<StatePredicate>,
    pub output_formats: Vec<OutputFormat>,

    pub max_chunks_per_job: u64,
    pub max_channels_per_job: usize,
    pub max_concurrent: usize,
    /// Per-node retry budget handed to the execution service.
    pub retry: u32,
    /// Bounded rescue-resubmission budget for the whole workflow.
    pub max_rescue_attempts: u32,

    pub archive: bool,
    pub merge: MergePolicy,
    /// Sanitised extra file tag, empty for none.
    pub file_tag: String,

    /// Processing executable invoked as `exe <start> <end> <parameterFile>`.
    pub executable: PathBuf,
    pub dirs: RunDirs,

    /// Explicit `[start, end)` for offline mode; `None` means online.
    pub span: Option<Segment>,
    /// Online fallback: one chunk when reading the low-latency buffer,
    /// otherwise a fixed lookback.
    pub use_low_latency_buffer: bool,
}

impl ProcessingRequest {
    /// Assemble a request from the CLI arguments and a validated config.
    pub fn from_cli(args: &CliArgs, cfg: &ConfigFile) -> Result<Self> {
        let group = cfg.group(&args.group).ok_or_else(|| {
            TrigflowError::ConfigError(format!(
                "no [group.{}] section in {}",
                args.group,
                args.config_file.display()
            ))
        })?;

        if args.archive {
            // Archival consumes the merged files; a skipped stage would
            // leave holes in the archive.
            for (flag, set) in [
                ("skip-root-merge", args.skip_root_merge),
                ("skip-hdf5-merge", args.skip_hdf5_merge),
                ("skip-xml-merge", args.skip_xml_merge),
                ("skip-gzip", args.skip_gzip),
                ("skip-rm", args.skip_rm),
            ] {
                if set {
                    return Err(TrigflowError::ConfigError(format!(
                        "cannot use --{flag} together with --archive"
                    )));
                }
            }
        }

        let state = resolve_state(group);
        if state.is_some() && args.state_segments_file.is_none() {
            // Without a segment source the predicate cannot be evaluated
            // and the run would silently analyse all available time.
            return Err(TrigflowError::ConfigError(format!(
                "group '{}' configures a state predicate; pass --state-segments-file to supply its segments",
                args.group
            )));
        }

        let ifo = resolve_ifo(args, group)?;
        let channels = filter_channels(group, &args.exclude_channels);
        let span = resolve_span(args)?;
        let output_formats = resolve_formats(group)?;
        let executable = args.executable.clone().ok_or_else(|| {
            TrigflowError::ConfigError(
                "cannot determine processing executable, please pass --executable".to_string(),
            )
        })?;

        Ok(Self {
            group: args.group.clone(),
            ifo,
            frametype: group.frametype.clone(),
            channels,
            chunk_duration: group.chunk_duration,
            segment_duration: group.segment_duration,
            overlap_duration: group.overlap_duration,
            sample_frequency: group.sample_frequency,
            frequency_range: group.frequency_range,
            q_range: group.q_range,
            mismatch_max: group.mismatch_max,
            snr_threshold: group.snr_threshold,
            state,
            output_formats,
            max_chunks_per_job: args.max_chunks_per_job,
            max_channels_per_job: args.max_channels_per_job,
            max_concurrent: args.max_concurrent,
            retry: args.retry,
            max_rescue_attempts: args.max_rescue_attempts,
            archive: args.archive,
            merge: MergePolicy {
                skip_processing: args.skip_processing,
                skip_root_merge: args.skip_root_merge,
                skip_hdf5_merge: args.skip_hdf5_merge,
                skip_xml_merge: args.skip_xml_merge,
                skip_gzip: args.skip_gzip,
                skip_rm: args.skip_rm,
            },
            file_tag: sanitize_tag(&args.file_tag),
            executable,
            dirs: RunDirs::new(&args.output_dir, &args.group),
            span,
            use_low_latency_buffer: args.use_low_latency_buffer,
        })
    }

    pub fn mode(&self) -> RunMode {
        if self.span.is_some() {
            RunMode::Offline
        } else {
            RunMode::Online
        }
    }

    /// Symmetric margin around each trigger segment, half the overlap.
    pub fn padding(&self) -> u64 {
        self.overlap_duration / 2
    }

    /// Description tag used in trigger file names.
    pub fn trigger_tag(&self) -> String {
        if self.file_tag.is_empty() {
            "TRIGGERS".to_string()
        } else {
            format!("TRIGGERS_{}", self.file_tag)
        }
    }
}

fn resolve_ifo(args: &CliArgs, group: &GroupConfig) -> Result<String> {
    if let Some(ifo) = args.ifo.as_ref() {
        return Ok(ifo.clone());
    }
    // Fall back to the prefix of the first channel, e.g. "H1:GDS-..." -> "H1".
    group
        .channels
        .first()
        .and_then(|c| c.split(':').next())
        .filter(|p| !p.is_empty())
        .map(|p| p.to_string())
        .ok_or_else(|| {
            TrigflowError::ConfigError(
                "cannot determine IFO prefix, please pass --ifo".to_string(),
            )
        })
}

fn filter_channels(group: &GroupConfig, excluded: &[String]) -> Vec<String> {
    let mut channels = Vec::with_capacity(group.channels.len());
    for chan in group.channels.iter() {
        if excluded.iter().any(|x| x == chan) {
            debug!(channel = %chan, "channel excluded from analysis");
        } else {
            channels.push(chan.clone());
        }
    }
    channels
}

fn resolve_span(args: &CliArgs) -> Result<Option<Segment>> {
    match args.gps.as_deref() {
        None => Ok(None),
        Some([start, end]) => {
            if start > end {
                return Err(TrigflowError::ConfigError(format!(
                    "invalid GPS span: start ({start}) is after end ({end})"
                )));
            }
            Ok(Some(Segment::new(*start, *end)))
        }
        Some(other) => Err(TrigflowError::ConfigError(format!(
            "--gps expects exactly two values, got {}",
            other.len()
        ))),
    }
}

fn resolve_state(group: &GroupConfig) -> Option<StatePredicate> {
    if group.state_flag.is_none() && group.state_channel.is_none() {
        return None;
    }
    Some(StatePredicate {
        flag: group.state_flag.clone(),
        channel: group.state_channel.clone(),
        frametype: group.state_frametype.clone(),
        bits: group.state_bits.clone().unwrap_or_else(|| vec![0]),
        padding: group.state_padding.map(|p| p.pair()).unwrap_or((0, 0)),
    })
}

fn resolve_formats(group: &GroupConfig) -> Result<Vec<OutputFormat>> {
    let mut formats = match group.output_formats.as_ref() {
        None => OutputFormat::ALL.to_vec(),
        Some(names) => {
            let mut v = Vec::with_capacity(names.len());
            for name in names {
                v.push(OutputFormat::from_str(name).map_err(TrigflowError::ConfigError)?);
            }
            v
        }
    };
    formats.sort();
    formats.dedup();
    Ok(formats)
}

/// Format a file tag as an underscore-delimited upper-case string.
pub fn sanitize_tag(tag: &str) -> String {
    let cleaned: String = tag
        .trim()
        .chars()
        .map(|c| {
            if c == ':' || c == '-' || c.is_whitespace() {
                '_'
            } else {
                c.to_ascii_uppercase()
            }
        })
        .collect();
    cleaned.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_tag_normalises_separators() {
        assert_eq!(sanitize_tag("std reproc-b:1"), "STD_REPROC_B_1");
        assert_eq!(sanitize_tag("-edge-"), "EDGE");
        assert_eq!(sanitize_tag(""), "");
    }

    #[test]
    fn merge_policy_txt_never_merged() {
        let policy = MergePolicy::default();
        assert!(policy.merge_skipped(OutputFormat::Txt));
        assert!(!policy.merge_skipped(OutputFormat::Root));
    }

    #[test]
    fn state_predicate_requires_a_segment_source() {
        use crate::config::model::RawConfigFile;
        use clap::Parser;

        let raw: RawConfigFile = toml::from_str(
            r#"
            [group.GW]
            channels = ["H1:GDS-CALIB_STRAIN"]
            frametype = "H1_HOFT_C00"
            chunk-duration = 124
            segment-duration = 64
            overlap-duration = 4
            state-flag = "H1:DMT-ANALYSIS_READY:1"
            "#,
        )
        .unwrap();
        let cfg = ConfigFile::try_from(raw).unwrap();

        let args = CliArgs::parse_from([
            "trigflow",
            "GW",
            "--executable",
            "/usr/bin/omicron",
            "--gps",
            "0",
            "10000",
        ]);
        let err = ProcessingRequest::from_cli(&args, &cfg).unwrap_err();
        assert!(matches!(err, TrigflowError::ConfigError(_)));

        let args = CliArgs::parse_from([
            "trigflow",
            "GW",
            "--executable",
            "/usr/bin/omicron",
            "--gps",
            "0",
            "10000",
            "--state-segments-file",
            "state.txt",
        ]);
        let req = ProcessingRequest::from_cli(&args, &cfg).unwrap();
        assert!(req.state.is_some());
    }

    #[test]
    fn run_dirs_layout() {
        let dirs = RunDirs::new(std::path::Path::new("/data"), "GW");
        assert_eq!(dirs.root, PathBuf::from("/data/GW"));
        assert_eq!(dirs.triggers, PathBuf::from("/data/GW/triggers"));
        assert_eq!(dirs.watermark_file(), PathBuf::from("/data/GW/segments.txt"));
        assert_eq!(
            dirs.dag_file("GW"),
            PathBuf::from("/data/GW/condor/trigflow-GW.dag")
        );
    }
}
