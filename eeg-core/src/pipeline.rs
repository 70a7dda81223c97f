//! Pipeline lifecycle: owns every buffer, the resampler, the serial
//! transport, and the shared atomics for their entire lifetime.
//!
//! States: `Idle -> Opening -> Handshaking -> Warmup -> Priming -> Running
//! -> Stopping -> Idle`. [`Pipeline::start`] drives construction from
//! `Idle` through `Running`; [`Pipeline::shutdown`] (also run on `Drop`)
//! drives it back to `Idle`, tearing everything down in reverse order.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::audio::{CallbackState, SharedState};
use crate::config::StreamConfig;
use crate::decoder::EEG_CHANNELS;
use crate::errors::{AudioError, PipelineError};
use crate::filter::EegFilter;
use crate::logging::SignalLogger;
use crate::ratio::RatioController;
use crate::resampler::EegResampler;
use crate::ring::{sample_ring, FrameBuffer, SampleConsumer, SampleProducer};
use crate::serial::SerialSource;
use crate::serial::SerialTransport;

/// Lifecycle state, exposed for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Opening,
    Handshaking,
    Warmup,
    Priming,
    Running,
    Stopping,
}

/// Owns the whole streaming pipeline: the producer thread (serial source,
/// filter, input ring producer), the audio stream (output ring, resampler,
/// ratio controller), and the shared atomics bridging them.
pub struct Pipeline {
    shared: Arc<SharedState>,
    producer_thread: Option<JoinHandle<()>>,
    stream: Option<cpal::Stream>,
    state: PipelineState,
}

impl Pipeline {
    /// Construct and run a pipeline end to end: open the transport,
    /// handshake, warm up, prime the input buffer, then start the audio
    /// stream and hand control to the ratio controller.
    pub fn start<T>(
        config: StreamConfig,
        transport: T,
        logger: &mut SignalLogger,
    ) -> Result<Self, PipelineError>
    where
        T: SerialTransport + 'static,
    {
        config.validate()?;

        let channels = config.pipeline.channel_count;
        let nominal_ratio = config.audio.sample_rate / 250.0;

        logger.info("SERIAL", "opening transport");
        let mut source = SerialSource::new(transport);

        logger.info("SERIAL", "handshaking");
        source.start_acquisition()?;

        logger.info(
            "SERIAL",
            format!("warmup: discarding {} frames", config.pipeline.warmup_frames),
        );
        for _ in 0..config.pipeline.warmup_frames {
            source.pull_frame()?;
        }

        let input_capacity = config.pipeline.input_buffer_frames();
        let output_capacity = config.audio.output_buffer_frames(config.pipeline.buffer_secs);
        let (mut input_producer, input_consumer) = sample_ring(input_capacity, channels);

        let mut filter = EegFilter::new(config.scaler.decay_mode.into());

        logger.info("BUFFER", "priming input buffer to 50% capacity");
        prime_input_buffer(&mut source, &mut filter, &mut input_producer, input_capacity / 2, channels)?;

        let shared = SharedState::new(nominal_ratio as f32);

        let stream = build_audio_stream(&config, channels, output_capacity, input_consumer, Arc::clone(&shared))?;
        stream
            .play()
            .map_err(|e| AudioError::StreamPlayFailed { reason: e.to_string() })?;

        shared.current_ratio.store(nominal_ratio as f32, Ordering::Relaxed);
        shared.enable_resample.store(true, Ordering::Relaxed);
        shared.enable_update.store(true, Ordering::Relaxed);

        logger.info("AUDIO", format!("running, nominal ratio = {:.3}", nominal_ratio));

        let shared_for_thread = Arc::clone(&shared);
        let producer_thread = std::thread::spawn(move || {
            producer_loop(source, filter, input_producer, shared_for_thread, channels);
        });

        Ok(Self {
            shared,
            producer_thread: Some(producer_thread),
            stream: Some(stream),
            state: PipelineState::Running,
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn current_ratio(&self) -> f32 {
        self.shared.current_ratio.load(Ordering::Relaxed)
    }

    pub fn output_limit(&self) -> f32 {
        self.shared.output_limit.load(Ordering::Relaxed)
    }

    /// Bytes scanned past lost frame boundaries so far this session,
    /// mirrored from the producer thread's [`crate::serial::SerialSource`].
    pub fn frames_dropped(&self) -> u64 {
        self.shared.frames_dropped.load(Ordering::Relaxed)
    }

    /// Total frames successfully decoded so far this session.
    pub fn frames_decoded(&self) -> u64 {
        self.shared.frames_decoded.load(Ordering::Relaxed)
    }

    /// Number of framing errors (failed initial decodes) observed so far.
    pub fn framing_errors(&self) -> u64 {
        self.shared.framing_errors.load(Ordering::Relaxed)
    }

    /// Stop the audio stream, signal the producer thread to exit, and join
    /// it. Idempotent.
    pub fn shutdown(&mut self) {
        if self.state == PipelineState::Idle {
            return;
        }
        self.state = PipelineState::Stopping;
        self.shared.keep_running.store(false, Ordering::Relaxed);
        self.shared.enable_resample.store(false, Ordering::Relaxed);
        self.shared.enable_update.store(false, Ordering::Relaxed);

        // Dropping the stream stops audio callbacks from firing again.
        self.stream.take();

        if let Some(handle) = self.producer_thread.take() {
            let _ = handle.join();
        }
        self.state = PipelineState::Idle;
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn prime_input_buffer<T: SerialTransport>(
    source: &mut SerialSource<T>,
    filter: &mut EegFilter,
    producer: &mut SampleProducer,
    target_frames: usize,
    channels: usize,
) -> Result<(), PipelineError> {
    for _ in 0..target_frames {
        let sample = source.pull_frame()?;
        let mut eeg = [0f32; EEG_CHANNELS];
        eeg.copy_from_slice(&sample[..EEG_CHANNELS]);
        let scaled = filter.process(&eeg);
        producer.push_frame(&scaled[..channels]);
    }
    Ok(())
}

/// Drives the serial source at its own pace, filtering and pushing
/// frames onto the input ring until told to stop or the transport fails.
fn producer_loop<T: SerialTransport>(
    mut source: SerialSource<T>,
    mut filter: EegFilter,
    mut producer: SampleProducer,
    shared: Arc<SharedState>,
    channels: usize,
) {
    while shared.keep_running.load(Ordering::Relaxed) {
        match source.pull_frame() {
            Ok(sample) => {
                let mut eeg = [0f32; EEG_CHANNELS];
                eeg.copy_from_slice(&sample[..EEG_CHANNELS]);
                let scaled = filter.process(&eeg);
                producer.push_frame(&scaled[..channels]);
            }
            Err(_) => {
                shared.keep_running.store(false, Ordering::Relaxed);
                break;
            }
        }
        shared.frames_dropped.store(source.frames_dropped(), Ordering::Relaxed);
        shared.frames_decoded.store(source.frames_decoded(), Ordering::Relaxed);
        shared.framing_errors.store(source.framing_errors(), Ordering::Relaxed);
    }

    let _ = source.stop_acquisition();
}

fn build_audio_stream(
    config: &StreamConfig,
    channels: usize,
    output_capacity: usize,
    input_consumer: SampleConsumer,
    shared: Arc<SharedState>,
) -> Result<cpal::Stream, AudioError> {
    let host = cpal::default_host();
    let device = match &config.audio.device_name {
        Some(name) => host
            .output_devices()
            .map_err(|e| AudioError::StreamBuildFailed { reason: e.to_string() })?
            .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
            .ok_or_else(|| AudioError::DeviceNotFound { name: name.clone() })?,
        None => host.default_output_device().ok_or(AudioError::NoDevice)?,
    };

    let stream_config = cpal::StreamConfig {
        channels: channels as u16,
        sample_rate: cpal::SampleRate(config.audio.sample_rate as u32),
        buffer_size: cpal::BufferSize::Default,
    };

    let block_size_frames = (config.pipeline.block_size_secs * config.audio.sample_rate).round() as usize;
    let output = FrameBuffer::new(output_capacity, channels);
    let resampler = EegResampler::new(channels, config.audio.sample_rate / 250.0)
        .map_err(|e| AudioError::StreamBuildFailed { reason: e.to_string() })?;
    let controller = RatioController::new(
        config.audio.sample_rate as f32,
        250.0,
        config.pipeline.block_size_secs as f32,
    );

    let mut callback_state =
        CallbackState::new(output, resampler, controller, input_consumer, shared, channels, block_size_frames);

    let err_fn = |err| eprintln!("audio stream error: {err}");

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let _ = callback_state.run(data);
            },
            err_fn,
            None,
        )
        .map_err(|e| AudioError::StreamBuildFailed { reason: e.to_string() })?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_states_are_distinct() {
        assert_eq!(PipelineState::Idle, PipelineState::Idle);
        assert_ne!(PipelineState::Idle, PipelineState::Running);
        assert_ne!(PipelineState::Warmup, PipelineState::Priming);
    }
}
