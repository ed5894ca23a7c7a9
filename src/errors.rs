// src/errors.rs

//! Crate-wide error taxonomy and `Result` alias.

use thiserror::Error;

use crate::segments::Segment;

#[derive(Error, Debug)]
pub enum TrigflowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An external data query (availability or state predicate) failed.
    ///
    /// Transient in online mode (the run becomes a no-op retry); fatal in
    /// offline mode.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// Offline span shorter than one chunk.
    #[error("Span {span} is too short ({duration} < {minimum}), extend the span or shorten the timing parameters")]
    SpanTooShort {
        span: Segment,
        duration: u64,
        minimum: u64,
    },

    /// Offline run found zero analysable segments.
    #[error("No analysable segments found in {0}")]
    NoAnalysableData(Segment),

    /// Online span determination had neither a watermark nor a fallback policy.
    #[error("No watermark record for group '{0}' and no fallback start policy")]
    NoWatermarkAndNoFallback(String),

    /// Another workflow for the same group is already active.
    #[error("Workflow for group '{group}' already running ({detail}); pass --reattach to follow it")]
    Collision { group: String, detail: String },

    /// A channel group resolved to zero channels.
    #[error("Channel group {index} is empty (all channels excluded?)")]
    EmptyChannelGroup { index: usize },

    /// The execution service reported failure after the rescue budget was spent.
    #[error("Workflow failed permanently with exit code {code} after {attempts} attempts")]
    WorkflowFailedPermanently { code: i32, attempts: u32 },

    /// Rescue mode requested but no rescue artifact exists.
    #[error("--rescue given but no rescue files found for {0}")]
    NoRescueArtifact(String),

    #[error("Execution service error: {0}")]
    Service(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TrigflowError>;
