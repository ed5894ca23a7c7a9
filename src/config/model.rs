// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [group.GW]
/// channels = ["H1:GDS-CALIB_STRAIN"]
/// frametype = "H1_HOFT_C00"
/// chunk-duration = 124
/// segment-duration = 64
/// overlap-duration = 4
/// sample-frequency = 16384
/// frequency-range = [4.0, 8192.0]
/// mismatch-max = 0.2
/// snr-threshold = 5.0
/// state-flag = "H1:DMT-CALIBRATED:1"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// All processing groups from `[group.<name>]`.
    #[serde(default)]
    pub group: BTreeMap<String, GroupConfig>,
}

/// One `[group.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GroupConfig {
    /// Channels to process. Order is preserved; it determines channel
    /// grouping and therefore workflow topology.
    pub channels: Vec<String>,

    /// Frame/data type to read.
    pub frametype: String,

    /// Chunk duration in seconds (minimum processing block).
    pub chunk_duration: u64,

    /// Analysis segment duration in seconds (minimum usable segment).
    pub segment_duration: u64,

    /// Overlap between consecutive chunks in seconds. Must be even; half of
    /// it is the padding applied around every processing segment.
    pub overlap_duration: u64,

    /// Sampling frequency in Hz.
    #[serde(default)]
    pub sample_frequency: Option<f64>,

    /// Search frequency range `[low, high)` in Hz.
    #[serde(default)]
    pub frequency_range: Option<[f64; 2]>,

    /// Q range for the search.
    #[serde(default)]
    pub q_range: Option<[f64; 2]>,

    /// Maximum template-bank mismatch.
    #[serde(default)]
    pub mismatch_max: Option<f64>,

    /// SNR threshold for recorded triggers.
    #[serde(default)]
    pub snr_threshold: Option<f64>,

    /// Good-state flag queried from the segment database.
    #[serde(default)]
    pub state_flag: Option<String>,

    /// Good-state channel read directly from frames.
    #[serde(default)]
    pub state_channel: Option<String>,

    /// Frametype holding the state channel. Required when `state-channel`
    /// is given.
    #[serde(default)]
    pub state_frametype: Option<String>,

    /// Bits that must be set in the state channel.
    #[serde(default)]
    pub state_bits: Option<Vec<u32>>,

    /// Padding applied to state segments, scalar (symmetric) or `[pre, post]`.
    #[serde(default)]
    pub state_padding: Option<StatePadding>,

    /// Output formats to produce; defaults to all of
    /// `["root", "hdf5", "xml", "txt"]`.
    #[serde(default)]
    pub output_formats: Option<Vec<String>>,
}

/// State-segment padding, either symmetric or `[pre, post]`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum StatePadding {
    Symmetric(i64),
    Pair([i64; 2]),
}

impl StatePadding {
    pub fn pair(self) -> (i64, i64) {
        match self {
            StatePadding::Symmetric(p) => (p, p),
            StatePadding::Pair([pre, post]) => (pre, post),
        }
    }
}

/// Validated configuration.
///
/// Constructed only via `TryFrom<RawConfigFile>` (see [`super::validate`]),
/// so holding a `ConfigFile` implies the group sections passed all checks.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    group: BTreeMap<String, GroupConfig>,
}

impl ConfigFile {
    /// Internal constructor used by the validation layer.
    pub(crate) fn new_unchecked(group: BTreeMap<String, GroupConfig>) -> Self {
        Self { group }
    }

    pub fn groups(&self) -> &BTreeMap<String, GroupConfig> {
        &self.group
    }

    pub fn group(&self, name: &str) -> Option<&GroupConfig> {
        self.group.get(name)
    }
}
