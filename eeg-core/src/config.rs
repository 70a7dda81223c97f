//! Configuration types for the streaming pipeline.
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::filter::ScalerMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Explicit device path. If absent, the pipeline falls back to the
    /// "UN" name-hint scan (see `serial::find_port_by_name_hint`).
    #[serde(default)]
    pub port: Option<String>,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

fn default_baud_rate() -> u32 {
    115_200
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self { port: None, baud_rate: default_baud_rate() }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_channel_count")]
    pub channel_count: usize,

    #[serde(default = "default_block_size_secs")]
    pub block_size_secs: f64,

    #[serde(default = "default_buffer_secs")]
    pub buffer_secs: f64,

    #[serde(default = "default_warmup_frames")]
    pub warmup_frames: usize,
}

fn default_channel_count() -> usize {
    8
}
fn default_block_size_secs() -> f64 {
    0.01
}
fn default_buffer_secs() -> f64 {
    2.0
}
fn default_warmup_frames() -> usize {
    1250
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_count: default_channel_count(),
            block_size_secs: default_block_size_secs(),
            buffer_secs: default_buffer_secs(),
            warmup_frames: default_warmup_frames(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_count == 0 || self.channel_count > 8 {
            return Err(ConfigError::TooManyChannels { count: self.channel_count });
        }
        if self.block_size_secs <= 0.0 {
            return Err(ConfigError::InvalidBlockSize { secs: self.block_size_secs });
        }
        if self.buffer_secs <= self.block_size_secs {
            return Err(ConfigError::BufferTooSmall { secs: self.buffer_secs });
        }
        Ok(())
    }

    /// Input ring capacity in frames, at the nominal 250Hz source rate.
    pub fn input_buffer_frames(&self) -> usize {
        (self.buffer_secs * 250.0).round() as usize
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,

    #[serde(default)]
    pub device_name: Option<String>,
}

fn default_sample_rate() -> f64 {
    44_100.0
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self { sample_rate: default_sample_rate(), device_name: None }
    }
}

impl AudioConfig {
    /// Output ring capacity in frames, given a pipeline buffer duration.
    pub fn output_buffer_frames(&self, buffer_secs: f64) -> usize {
        (buffer_secs * self.sample_rate).round() as usize
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScalerDecayMode {
    #[default]
    Monotonic,
    SlowDecay,
}

impl From<ScalerDecayMode> for ScalerMode {
    fn from(m: ScalerDecayMode) -> Self {
        match m {
            ScalerDecayMode::Monotonic => ScalerMode::Monotonic,
            ScalerDecayMode::SlowDecay => ScalerMode::SlowDecay,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScalerConfig {
    #[serde(default)]
    pub decay_mode: ScalerDecayMode,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Audio,
    Text,
    Bus,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SinkConfig {
    #[serde(default)]
    pub kind: SinkKind,

    #[serde(default)]
    pub text_path: Option<std::path::PathBuf>,
}

impl SinkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kind == SinkKind::Text && self.text_path.is_none() {
            return Err(ConfigError::MissingTextPath);
        }
        Ok(())
    }
}

/// Top-level configuration bundle, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StreamConfig {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub scaler: ScalerConfig,

    #[serde(default)]
    pub sink: SinkConfig,
}

impl StreamConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        self.sink.validate()?;
        Ok(())
    }
}
