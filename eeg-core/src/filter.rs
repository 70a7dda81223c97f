//! Per-channel DC-removal high-pass filter and running-peak auto-scaler.
//!
//! Runs after decoding, before a sample is pushed into the input ring.
//! Only the EEG channels are touched; accel/gyro/battery/counter pass
//! through the pipeline's audio path untouched (and are not used by it
//! at all -- only the text and streaming-bus sinks see them).

use crate::decoder::EEG_CHANNELS;

/// Time constant of the exponential baseline tracker, ~10s decay at 250Hz.
pub const LAMBDA: f32 = 2.772e-4;

/// How the auto-scaler's running peak (`outputLimit`) evolves over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalerMode {
    /// `outputLimit` only ever grows. Matches the original device software
    /// bit-for-bit and is the default.
    Monotonic,
    /// `outputLimit` grows on a new peak but otherwise relaxes slowly
    /// toward the most recent peak. Opt-in only.
    SlowDecay,
}

impl Default for ScalerMode {
    fn default() -> Self {
        ScalerMode::Monotonic
    }
}

/// Decay rate for `SlowDecay` mode; chosen to be much slower than the
/// DC filter's own baseline tracking so it never fights it.
const SLOW_DECAY_LAMBDA: f32 = 1.0e-5;

/// Combined per-channel DC-removal filter and auto-scaler for the 8 EEG channels.
#[derive(Debug, Clone)]
pub struct EegFilter {
    baseline: [f32; EEG_CHANNELS],
    initialised: bool,
    output_limit: f32,
    mode: ScalerMode,
}

impl EegFilter {
    pub fn new(mode: ScalerMode) -> Self {
        Self {
            baseline: [0.0; EEG_CHANNELS],
            initialised: false,
            output_limit: 1.0,
            mode,
        }
    }

    /// Current running peak magnitude used to normalise output.
    pub fn output_limit(&self) -> f32 {
        self.output_limit
    }

    /// Apply the DC-removal filter and auto-scaler to one frame's worth of
    /// EEG channels in place, returning the normalised values.
    ///
    /// The first call after construction initialises the baseline to the
    /// input itself (per-channel) to avoid a multi-second startup ramp;
    /// see the design notes on the DC filter's initial condition.
    pub fn process(&mut self, eeg: &[f32; EEG_CHANNELS]) -> [f32; EEG_CHANNELS] {
        if !self.initialised {
            self.baseline = *eeg;
            self.initialised = true;
        }

        let mut out = [0f32; EEG_CHANNELS];
        let mut peak_this_sample = 0f32;

        for c in 0..EEG_CHANNELS {
            self.baseline[c] = (1.0 - LAMBDA) * self.baseline[c] + LAMBDA * eeg[c];
            let y = eeg[c] - self.baseline[c];
            out[c] = y;
            peak_this_sample = peak_this_sample.max(y.abs());
        }

        match self.mode {
            ScalerMode::Monotonic => {
                self.output_limit = self.output_limit.max(peak_this_sample);
            }
            ScalerMode::SlowDecay => {
                if peak_this_sample > self.output_limit {
                    self.output_limit = peak_this_sample;
                } else {
                    self.output_limit = (1.0 - SLOW_DECAY_LAMBDA) * self.output_limit
                        + SLOW_DECAY_LAMBDA * peak_this_sample.max(1.0);
                }
            }
        }

        for v in out.iter_mut() {
            *v /= self.output_limit;
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_initialises_to_first_sample_avoiding_transient() {
        let mut f = EegFilter::new(ScalerMode::Monotonic);
        let first = [5.0; EEG_CHANNELS];
        let out = f.process(&first);
        // y = x - baseline = x - x = 0 on the very first sample.
        for v in out {
            assert!(v.abs() < 1e-6);
        }
    }

    #[test]
    fn output_limit_is_monotonic_by_default() {
        let mut f = EegFilter::new(ScalerMode::Monotonic);
        f.process(&[0.0; EEG_CHANNELS]);
        let limit0 = f.output_limit();

        let mut big = [0.0; EEG_CHANNELS];
        big[0] = 100.0;
        f.process(&big);
        let limit1 = f.output_limit();
        assert!(limit1 >= limit0);

        f.process(&[0.0; EEG_CHANNELS]);
        let limit2 = f.output_limit();
        assert!(limit2 >= limit1);
    }

    #[test]
    fn output_limit_never_below_one() {
        let mut f = EegFilter::new(ScalerMode::Monotonic);
        f.process(&[0.01; EEG_CHANNELS]);
        assert!(f.output_limit() >= 1.0);
    }

    #[test]
    fn normalised_output_stays_within_unit_range_for_steady_signal() {
        let mut f = EegFilter::new(ScalerMode::Monotonic);
        for _ in 0..100 {
            let out = f.process(&[0.5; EEG_CHANNELS]);
            for v in out {
                assert!(v.abs() <= 1.0 + 1e-4);
            }
        }
    }

    #[test]
    fn slow_decay_mode_relaxes_after_a_transient() {
        let mut f = EegFilter::new(ScalerMode::SlowDecay);
        f.process(&[0.0; EEG_CHANNELS]);

        let mut spike = [0.0; EEG_CHANNELS];
        spike[0] = 50.0;
        f.process(&spike);
        let after_spike = f.output_limit();

        for _ in 0..10_000 {
            f.process(&[0.01; EEG_CHANNELS]);
        }
        let after_quiet = f.output_limit();

        assert!(after_quiet < after_spike);
    }
}
