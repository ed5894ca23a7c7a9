// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{ArgGroup, Parser, ValueEnum};

/// Command-line arguments for `trigflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "trigflow",
    version,
    about = "Compile and babysit trigger-generation workflows over archived detector data.",
    long_about = None
)]
#[command(group(ArgGroup::new("submit-mode").args(["rescue", "reattach", "no_submit"])))]
pub struct CliArgs {
    /// Name of the configuration group to process.
    pub group: String,

    /// GPS start and end times for offline processing.
    ///
    /// If omitted, the run operates in 'online' mode: it resumes from the
    /// last recorded watermark and processes up to the latest available data.
    #[arg(short = 't', long, num_args = 2, value_names = ["GPSSTART", "GPSEND"])]
    pub gps: Option<Vec<u64>>,

    /// Path to the configuration file (TOML).
    #[arg(short = 'f', long, value_name = "PATH", default_value = "trigflow.toml")]
    pub config_file: PathBuf,

    /// Source (interferometer) prefix to process, e.g. "H1".
    #[arg(short = 'i', long)]
    pub ifo: Option<String>,

    /// Path to the run output directory.
    #[arg(short = 'o', long, value_name = "PATH", default_value = ".")]
    pub output_dir: PathBuf,

    /// Archive merged trigger files once every merge has completed.
    #[arg(short = 'a', long)]
    pub archive: bool,

    /// Additional file tag to append to final file descriptions.
    #[arg(short = 'g', long, default_value = "")]
    pub file_tag: String,

    /// Maximum number of chunks to process in a single job.
    #[arg(short = 'C', long, default_value_t = 4)]
    pub max_chunks_per_job: u64,

    /// Maximum number of channels to process in a single job.
    #[arg(short = 'N', long, default_value_t = 10)]
    pub max_channels_per_job: usize,

    /// Maximum number of processing jobs running at one time.
    #[arg(long, default_value_t = 10)]
    pub max_concurrent: usize,

    /// Exclude a channel from the analysis (can be given multiple times).
    #[arg(short = 'x', long = "exclude-channel", value_name = "CHANNEL")]
    pub exclude_channels: Vec<String>,

    /// Path to the processing executable.
    #[arg(long, value_name = "PATH")]
    pub executable: Option<PathBuf>,

    /// Number of times the execution service retries each node on failure.
    #[arg(long, default_value_t = 2)]
    pub retry: u32,

    /// Number of times to automatically resubmit a failed workflow via its
    /// rescue artifact before giving up.
    #[arg(long, default_value_t = 0)]
    pub max_rescue_attempts: u32,

    /// Rescue a failed workflow instead of creating a new one.
    #[arg(long)]
    pub rescue: bool,

    /// If a workflow is already running, reattach to it and follow its
    /// progress. Only designed for online running.
    #[arg(long)]
    pub reattach: bool,

    /// Compile and write the workflow but do not submit it.
    #[arg(long)]
    pub no_submit: bool,

    /// Proceed with a fresh submission even if rescue artifacts exist.
    #[arg(long)]
    pub force: bool,

    /// Use frame locations from FILE instead of querying availability.
    #[arg(long, value_name = "FILE")]
    pub cache_file: Option<PathBuf>,

    /// Read state-predicate segments from FILE instead of the segment database.
    #[arg(long, value_name = "FILE")]
    pub state_segments_file: Option<PathBuf>,

    /// Use the low-latency frame buffer; the no-watermark fallback then
    /// covers a single chunk instead of the fixed lookback.
    #[arg(long)]
    pub use_low_latency_buffer: bool,

    /// Skip running the processing executable (compile post-processing only).
    #[arg(long)]
    pub skip_processing: bool,

    /// Skip merging native binary trigger files.
    #[arg(long)]
    pub skip_root_merge: bool,

    /// Skip merging table-format trigger files.
    #[arg(long)]
    pub skip_hdf5_merge: bool,

    /// Skip merging event-list documents.
    #[arg(long)]
    pub skip_xml_merge: bool,

    /// Skip gzipping merged event-list documents.
    #[arg(long)]
    pub skip_gzip: bool,

    /// Do not remove per-chunk trigger files after merging. Useful for
    /// debugging.
    #[arg(long)]
    pub skip_rm: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TRIGFLOW_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse config, compile the plan, print it, but submit nothing.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
