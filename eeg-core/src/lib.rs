//! EEG-to-audio streaming pipeline, core library.
//!
//! Decodes the Unicorn headset's 45-byte serial frames, removes DC offset
//! and auto-scales each EEG channel, resamples the 250Hz source onto the
//! host audio clock through a closed-loop ratio controller, and exposes
//! the result as a real-time audio stream alongside a text and a
//! streaming-bus sink.

pub mod audio;
pub mod config;
pub mod decoder;
pub mod errors;
pub mod filter;
pub mod logging;
pub mod pipeline;
pub mod ratio;
pub mod resampler;
pub mod ring;
pub mod serial;
pub mod sinks;

pub use config::StreamConfig;
pub use errors::{PipelineError, Result};
pub use pipeline::{Pipeline, PipelineState};
