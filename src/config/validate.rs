// src/config/validate.rs

use std::str::FromStr;

use crate::config::model::{ConfigFile, GroupConfig, RawConfigFile};
use crate::errors::{Result, TrigflowError};
use crate::types::OutputFormat;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = TrigflowError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.group))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_groups(cfg)?;
    for (name, group) in cfg.group.iter() {
        validate_group(name, group)?;
    }
    Ok(())
}

fn ensure_has_groups(cfg: &RawConfigFile) -> Result<()> {
    if cfg.group.is_empty() {
        return Err(TrigflowError::ConfigError(
            "config must contain at least one [group.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_group(name: &str, group: &GroupConfig) -> Result<()> {
    validate_timing(name, group)?;
    validate_channels(name, group)?;
    validate_state_predicate(name, group)?;
    validate_output_formats(name, group)?;
    Ok(())
}

fn validate_timing(name: &str, group: &GroupConfig) -> Result<()> {
    if group.chunk_duration == 0 {
        return Err(TrigflowError::ConfigError(format!(
            "group '{}': chunk-duration must be >= 1 (got 0)",
            name
        )));
    }
    if group.segment_duration > group.chunk_duration {
        return Err(TrigflowError::ConfigError(format!(
            "group '{}': segment-duration ({}) cannot exceed chunk-duration ({})",
            name, group.segment_duration, group.chunk_duration
        )));
    }
    if group.overlap_duration % 2 != 0 {
        return Err(TrigflowError::ConfigError(format!(
            "group '{}': overlap-duration ({}) must be even (padding is half the overlap)",
            name, group.overlap_duration
        )));
    }
    if group.overlap_duration >= group.segment_duration {
        return Err(TrigflowError::ConfigError(format!(
            "group '{}': overlap-duration ({}) must be smaller than segment-duration ({})",
            name, group.overlap_duration, group.segment_duration
        )));
    }
    Ok(())
}

fn validate_channels(name: &str, group: &GroupConfig) -> Result<()> {
    if group.channels.is_empty() {
        return Err(TrigflowError::ConfigError(format!(
            "group '{}': channels list is empty",
            name
        )));
    }
    for chan in group.channels.iter() {
        if chan.trim().is_empty() {
            return Err(TrigflowError::ConfigError(format!(
                "group '{}': channels list contains an empty entry",
                name
            )));
        }
    }
    Ok(())
}

fn validate_state_predicate(name: &str, group: &GroupConfig) -> Result<()> {
    if group.state_channel.is_some() && group.state_frametype.is_none() {
        return Err(TrigflowError::ConfigError(format!(
            "group '{}': state-frametype must be specified when state-channel is given",
            name
        )));
    }
    if group.state_bits.is_some() && group.state_channel.is_none() {
        return Err(TrigflowError::ConfigError(format!(
            "group '{}': state-bits given without state-channel",
            name
        )));
    }
    Ok(())
}

fn validate_output_formats(name: &str, group: &GroupConfig) -> Result<()> {
    if let Some(formats) = group.output_formats.as_ref() {
        if formats.is_empty() {
            return Err(TrigflowError::ConfigError(format!(
                "group '{}': output-formats must not be empty when given",
                name
            )));
        }
        for fmt in formats {
            OutputFormat::from_str(fmt).map_err(|e| {
                TrigflowError::ConfigError(format!("group '{}': {}", name, e))
            })?;
        }
    }
    Ok(())
}
