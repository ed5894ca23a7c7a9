// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Whether a run covers an explicit span or follows the live data edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Explicit `[start, end)` passed on the command line.
    Offline,
    /// Resume from the watermark and process up to the latest data.
    Online,
}

impl RunMode {
    pub fn is_online(self) -> bool {
        matches!(self, RunMode::Online)
    }
}

/// How this run interacts with the execution service.
///
/// The three modes are pairwise exclusive per run:
/// - `Fresh`: compile a new workflow, write it to disk and submit it.
/// - `Rescue`: recompile the previous workflow in memory and replay it
///   onto the existing rescue chain; nothing is written to disk.
/// - `Reattach`: follow an already-running workflow instead of submitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    Fresh,
    Rescue,
    Reattach,
}

/// Trigger file formats the processing executable can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Native binary trigger files.
    Root,
    /// Table-format trigger files.
    Hdf5,
    /// Event-list documents (optionally gzipped after merging).
    Xml,
    /// Plain-text trigger lists.
    Txt,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Root,
        OutputFormat::Hdf5,
        OutputFormat::Xml,
        OutputFormat::Txt,
    ];

    /// File extension used for trigger files of this format.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Root => "root",
            OutputFormat::Hdf5 => "h5",
            OutputFormat::Xml => "xml",
            OutputFormat::Txt => "txt",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Root => "root",
            OutputFormat::Hdf5 => "hdf5",
            OutputFormat::Xml => "xml",
            OutputFormat::Txt => "txt",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "root" => Ok(OutputFormat::Root),
            "hdf5" | "h5" => Ok(OutputFormat::Hdf5),
            "xml" => Ok(OutputFormat::Xml),
            "txt" | "text" => Ok(OutputFormat::Txt),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
