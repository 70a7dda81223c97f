//! Closed-loop resampling-ratio controller.
//!
//! Runs inside the audio callback once per block. It nudges the
//! resampler's ratio so the output buffer stays near half-full despite
//! clock drift between the device's 250Hz oscillator and the host audio
//! clock.

/// Fraction of capacity defining the four fill-level bands.
const VERY_LOW: f32 = 0.40;
const LOW: f32 = 0.48;
const HIGH: f32 = 0.52;
const VERY_HIGH: f32 = 0.60;

/// Clamp applied to the ratio estimate, as a fraction of `nominal`.
const CLAMP_LOW: f32 = 0.8;
const CLAMP_HIGH: f32 = 1.2;

/// Smoothing coefficient in effect for one controller tick.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Smoothing {
    Slow,
    Fast,
}

/// Regulator state. `block_size_secs` is the audio callback period, which
/// doubles as the controller tick period.
#[derive(Debug, Clone, Copy)]
pub struct RatioController {
    nominal: f32,
    block_size_secs: f32,
}

impl RatioController {
    /// `sink_rate` and `source_rate` (nominally 250Hz) define `nominal = sink_rate / source_rate`.
    pub fn new(sink_rate: f32, source_rate: f32, block_size_secs: f32) -> Self {
        Self {
            nominal: sink_rate / source_rate,
            block_size_secs,
        }
    }

    pub fn nominal(&self) -> f32 {
        self.nominal
    }

    /// Compute the next `currentRatio` given the current ratio, the output
    /// buffer's capacity and current fill level (both in frames).
    pub fn update(&self, current_ratio: f32, capacity: usize, fill: usize) -> f32 {
        let capacity = capacity as f32;
        let fill = fill as f32;
        let block_size_frames = self.block_size_secs * self.nominal_sink_rate();

        let estimate = {
            let raw = self.nominal + (0.5 * capacity - fill) / block_size_frames;
            raw.clamp(CLAMP_LOW * self.nominal, CLAMP_HIGH * self.nominal)
        };

        let (target, smoothing) = if fill < VERY_LOW * capacity {
            (estimate, Smoothing::Fast)
        } else if fill < LOW * capacity {
            (estimate, Smoothing::Slow)
        } else if fill <= HIGH * capacity {
            (self.nominal, Smoothing::Fast)
        } else if fill <= VERY_HIGH * capacity {
            (estimate, Smoothing::Slow)
        } else {
            (estimate, Smoothing::Fast)
        };

        let lambda = match smoothing {
            Smoothing::Slow => 1.0 * self.block_size_secs,
            Smoothing::Fast => 10.0 * self.block_size_secs,
        };
        let lambda = lambda.clamp(0.0, 1.0);

        let next = (1.0 - lambda) * current_ratio + lambda * target;
        next.clamp(CLAMP_LOW * self.nominal, CLAMP_HIGH * self.nominal)
    }

    /// `block_size_frames` is expressed at the sink rate; since `nominal`
    /// already folds the sink rate in relative to the 250Hz source, we
    /// recover the sink rate as `nominal * 250`.
    fn nominal_sink_rate(&self) -> f32 {
        self.nominal * 250.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s4_controller_pushes_ratio_up_on_underrun() {
        let ctrl = RatioController::new(44_100.0, 250.0, 0.01);
        assert!((ctrl.nominal() - 176.4).abs() < 1e-3);

        let next = ctrl.update(ctrl.nominal(), 88_200, 10_000);
        assert!(next > ctrl.nominal());
        assert!(next <= 1.2 * ctrl.nominal() + 1e-3);
    }

    #[test]
    fn s5_controller_relaxes_at_centre() {
        let ctrl = RatioController::new(44_100.0, 250.0, 0.01);
        let drifted = ctrl.nominal() * 1.1;
        let next = ctrl.update(drifted, 88_200, 44_100);
        // Fast smoothing at centre band should pull strongly toward nominal.
        assert!(next < drifted);
        assert!(next > ctrl.nominal() - 1.0);
    }

    #[test]
    fn ratio_always_within_clamp() {
        let ctrl = RatioController::new(44_100.0, 250.0, 0.01);
        let mut ratio = ctrl.nominal();
        for fill in [0usize, 1000, 30_000, 44_100, 60_000, 88_200] {
            ratio = ctrl.update(ratio, 88_200, fill);
            assert!(ratio >= 0.8 * ctrl.nominal() - 1e-3);
            assert!(ratio <= 1.2 * ctrl.nominal() + 1e-3);
        }
    }

    #[test]
    fn empty_buffer_drives_ratio_toward_upper_clamp_over_many_ticks() {
        let ctrl = RatioController::new(44_100.0, 250.0, 0.01);
        let mut ratio = ctrl.nominal();
        for _ in 0..500 {
            ratio = ctrl.update(ratio, 88_200, 0);
        }
        assert!((ratio - 1.2 * ctrl.nominal()).abs() < 1.0);
    }
}
