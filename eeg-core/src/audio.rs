//! The real-time audio callback: drains the output buffer, drives the
//! resampler, and drives the ratio controller, all without blocking,
//! allocating, or waiting on a lock.
//!
//! [`CallbackState`] holds everything the callback context touches and is
//! deliberately host-agnostic: [`crate::pipeline`] wires it into a real
//! `cpal` stream, but it is exercised directly in tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use atomic_float::AtomicF32;

use crate::errors::ResamplerError;
use crate::ratio::RatioController;
use crate::resampler::EegResampler;
use crate::ring::{FrameBuffer, SampleConsumer};

/// Shared scalars updated by one context and read by the other. All
/// accesses go through atomics; see the concurrency notes.
pub struct SharedState {
    pub current_ratio: AtomicF32,
    pub output_limit: AtomicF32,
    pub enable_resample: AtomicBool,
    pub enable_update: AtomicBool,
    pub keep_running: AtomicBool,
    /// Telemetry counters mirrored from [`crate::serial::SerialSource`] by
    /// the producer thread, so the main thread can read them without
    /// touching the source itself.
    pub frames_dropped: AtomicU64,
    pub frames_decoded: AtomicU64,
    pub framing_errors: AtomicU64,
}

impl SharedState {
    pub fn new(initial_ratio: f32) -> Arc<Self> {
        Arc::new(Self {
            current_ratio: AtomicF32::new(initial_ratio),
            output_limit: AtomicF32::new(1.0),
            enable_resample: AtomicBool::new(false),
            enable_update: AtomicBool::new(false),
            keep_running: AtomicBool::new(true),
            frames_dropped: AtomicU64::new(0),
            frames_decoded: AtomicU64::new(0),
            framing_errors: AtomicU64::new(0),
        })
    }
}

/// Everything the audio callback owns: the output ring, the resampler,
/// the ratio controller, the consumer half of the input ring, and handles
/// to the shared atomics.
pub struct CallbackState {
    output: FrameBuffer,
    resampler: EegResampler,
    controller: RatioController,
    input: SampleConsumer,
    shared: Arc<SharedState>,
    channels: usize,
    block_size_frames: usize,
}

impl CallbackState {
    pub fn new(
        output: FrameBuffer,
        resampler: EegResampler,
        controller: RatioController,
        input: SampleConsumer,
        shared: Arc<SharedState>,
        channels: usize,
        block_size_frames: usize,
    ) -> Self {
        Self { output, resampler, controller, input, shared, channels, block_size_frames }
    }

    /// Run one callback invocation, writing exactly `destination.len() /
    /// channels` frames into `destination` (interleaved).
    pub fn run(&mut self, destination: &mut [f32]) -> Result<(), ResamplerError> {
        let frame_count = destination.len() / self.channels;

        let copied = self.output.pop_interleaved(frame_count, destination);
        for v in destination[copied * self.channels..].iter_mut() {
            *v = 0.0;
        }

        let peak = destination[..copied * self.channels]
            .iter()
            .fold(0f32, |acc, &v| acc.max(v.abs()));
        if peak > 0.0 {
            let prev = self.shared.output_limit.load(Ordering::Relaxed);
            self.shared.output_limit.store(prev.max(peak), Ordering::Relaxed);
        }

        if self.shared.enable_resample.load(Ordering::Relaxed) {
            self.run_resample()?;
        }

        if self.shared.enable_update.load(Ordering::Relaxed) {
            self.run_ratio_update();
        }

        Ok(())
    }

    fn run_resample(&mut self) -> Result<(), ResamplerError> {
        let needed = self.resampler.input_frames_needed();
        if self.input.frames_available() < needed {
            return Ok(());
        }
        if self.output.frames_free() == 0 {
            return Ok(());
        }

        let planar = self.resampler.scratch_in_mut();
        self.input.pop_planar(needed, planar);

        let mut interleaved = Vec::new();
        let produced = self.resampler.process_interleaved(planar, &mut interleaved)?;
        let bounded = produced.min(self.output.frames_free());
        self.output.push_interleaved(&interleaved[..bounded * self.channels]);
        Ok(())
    }

    fn run_ratio_update(&mut self) {
        let current = self.shared.current_ratio.load(Ordering::Relaxed);
        let next = self.controller.update(
            current,
            self.output.capacity_frames(),
            self.output.frames_available(),
        );
        self.shared.current_ratio.store(next, Ordering::Relaxed);
        let _ = self.resampler.nudge_ratio(next as f64);
    }

    pub fn block_size_frames(&self) -> usize {
        self.block_size_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::sample_ring;

    fn make_state(channels: usize, output_capacity: usize) -> CallbackState {
        let (_input_producer, input_consumer) = sample_ring(16, channels);
        let output = FrameBuffer::new(output_capacity, channels);
        let resampler = EegResampler::new(channels, 1.0).unwrap();
        let controller = RatioController::new(44_100.0, 250.0, 0.01);
        let shared = SharedState::new(176.4);
        CallbackState::new(output, resampler, controller, input_consumer, shared, channels, 441)
    }

    #[test]
    fn s6_audio_underflow_zero_fills() {
        let mut state = make_state(8, 2048);
        let mut dest = vec![1.0f32; 441 * 8];
        state.run(&mut dest).unwrap();
        assert!(dest.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn copies_available_frames_before_zero_filling() {
        let mut state = make_state(2, 16);
        state.output.push_interleaved(&[1.0, -1.0, 2.0, -2.0]);
        let mut dest = vec![9.0f32; 4 * 2];
        state.run(&mut dest).unwrap();
        assert_eq!(&dest[0..4], &[1.0, -1.0, 2.0, -2.0]);
        assert_eq!(&dest[4..8], &[0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn disabled_flags_skip_resample_and_ratio_update() {
        let mut state = make_state(8, 2048);
        let before = state.shared.current_ratio.load(Ordering::Relaxed);
        let mut dest = vec![0.0f32; 441 * 8];
        state.run(&mut dest).unwrap();
        let after = state.shared.current_ratio.load(Ordering::Relaxed);
        assert_eq!(before, after);
    }
}
