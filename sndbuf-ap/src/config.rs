//! Configuration for sndbuf-ap
//!
//! Two layers:
//! 1. **TOML bootstrap** ([`TomlConfig`]): optional input path and the
//!    `[pipeline]`, `[playback]` and `[logging]` sections
//! 2. **Command line**: overrides individual values (see `main.rs`)
//!
//! Every field has a built-in default, so an absent file or section is valid.

use crate::audio::types::{ChannelLayout, TargetSampleFormat};
use crate::error::{Error, Result};
use serde::Deserialize;
use sndbuf_common::LoggingConfig;
use std::path::PathBuf;
use std::time::Duration;

/// How the input file is presented to the container reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// Byte source adapter reads from the open file
    #[default]
    Stream,
    /// File is read fully into memory, adapter serves the in-memory copy
    Memory,
}

/// Runtime pipeline configuration, fixed for one run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Output sample format (interleaved, native-endian)
    pub target_sample_format: TargetSampleFormat,

    /// Output channel count: 1 or 2
    pub target_channel_count: u16,

    /// Force mono output regardless of `target_channel_count`
    pub resample_to_mono: bool,

    pub input_mode: InputMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_sample_format: TargetSampleFormat::S16,
            target_channel_count: 2,
            resample_to_mono: false,
            input_mode: InputMode::Stream,
        }
    }
}

impl PipelineConfig {
    /// Reject channel counts the output layout cannot express.
    pub fn validate(&self) -> Result<()> {
        if ChannelLayout::from_count(self.target_channel_count).is_none() {
            return Err(Error::Config(format!(
                "target_channel_count must be 1 or 2, got {}",
                self.target_channel_count
            )));
        }
        Ok(())
    }

    /// Effective output channel count.
    pub fn output_channel_count(&self) -> u16 {
        if self.resample_to_mono {
            1
        } else {
            self.target_channel_count
        }
    }

    /// Effective output layout.
    pub fn output_layout(&self) -> Result<ChannelLayout> {
        self.validate()?;
        ChannelLayout::from_count(self.output_channel_count()).ok_or_else(|| {
            Error::Config(format!(
                "no layout for {} channels",
                self.output_channel_count()
            ))
        })
    }
}

/// Playback collaborator settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Play the decoded buffer after decoding
    pub enabled: bool,

    /// Output device name (default device when unset or not found)
    pub device: Option<String>,

    /// First completion poll interval in milliseconds
    pub poll_initial_ms: u64,

    /// Upper bound for the completion poll interval in milliseconds
    pub poll_max_ms: u64,

    /// Give up when the device has not consumed samples for this long
    pub stall_timeout_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            device: None,
            poll_initial_ms: 10,
            poll_max_ms: 500,
            stall_timeout_ms: 5000,
        }
    }
}

impl PlaybackConfig {
    pub fn poll_initial(&self) -> Duration {
        Duration::from_millis(self.poll_initial_ms)
    }

    pub fn poll_max(&self) -> Duration {
        Duration::from_millis(self.poll_max_ms)
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_millis(self.stall_timeout_ms)
    }
}

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Input file (overridden by the command line)
    #[serde(default)]
    pub input: Option<PathBuf>,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}
