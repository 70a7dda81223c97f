//! Pipeline error types with granular categories.

use std::time::Duration;
use thiserror::Error;

/// Top-level error type for all pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("resampler error: {0}")]
    Resampler(#[from] ResamplerError),

    #[error("audio device error: {0}")]
    Audio(#[from] AudioError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Serial transport errors. All fatal: the pipeline tears down.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to open serial port {port}: {reason}")]
    Open { port: String, reason: String },

    #[error("no serial port found matching the configured name hint")]
    NoPortFound,

    #[error("operation {operation} timed out after {elapsed:?}")]
    Timeout {
        operation: &'static str,
        elapsed: Duration,
    },

    #[error("short write: expected {expected} bytes, wrote {actual}")]
    ShortWrite { expected: usize, actual: usize },

    #[error("resync scan exceeded its budget of {budget_bytes} bytes without finding a start sequence")]
    ResyncBudgetExceeded { budget_bytes: usize },

    #[error("underlying I/O error: {0}")]
    Io(String),
}

/// Frame-decoder framing errors. Recoverable via resync (see `serial::resync`);
/// only escalates to `TransportError::ResyncBudgetExceeded` if the scan runs dry.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FramingError {
    #[error("expected start bytes 0xC0 0x00, found 0x{0:02X} 0x{1:02X}")]
    BadStartBytes(u8, u8),

    #[error("short frame: expected 45 bytes, got {0}")]
    ShortFrame(usize),
}

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("device did not acknowledge start command: expected {{00,00,00}}, got {actual:?}")]
    BadStartAck { actual: Vec<u8> },

    #[error("device did not acknowledge stop command: expected {{00,00,00}}, got {actual:?}")]
    BadStopAck { actual: Vec<u8> },

    #[error("handshake timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Error)]
pub enum ResamplerError {
    #[error("invalid resample ratio {ratio} (must be finite and positive)")]
    InvalidRatio { ratio: f64 },

    #[error("resampler construction failed: {reason}")]
    ConstructionFailed { reason: String },

    #[error("resampler processing failed: {reason}")]
    ProcessingFailed { reason: String },
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no output audio device available")]
    NoDevice,

    #[error("requested output device {name:?} not found")]
    DeviceNotFound { name: String },

    #[error("failed to build output stream: {reason}")]
    StreamBuildFailed { reason: String },

    #[error("failed to start output stream: {reason}")]
    StreamPlayFailed { reason: String },

    #[error("unsupported stream configuration: {reason}")]
    UnsupportedConfig { reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("channel count {count} exceeds the maximum of 8")]
    TooManyChannels { count: usize },

    #[error("sample rate {rate} Hz must be positive")]
    InvalidSampleRate { rate: f64 },

    #[error("block size {secs} s must be positive")]
    InvalidBlockSize { secs: f64 },

    #[error("buffer size {secs} s is too small to hold a single block")]
    BufferTooSmall { secs: f64 },

    #[error("sink kind is 'text' but no text_path was configured")]
    MissingTextPath,
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
