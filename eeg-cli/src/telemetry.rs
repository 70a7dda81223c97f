//! Ratio telemetry sampling and statistical aggregation.
//!
//! Mirrors the original aggregator's shape (accumulate samples, emit once
//! per interval, summarise at shutdown) but tracks the resampling ratio
//! and auto-scaler output limit instead of QPSK BER/frequency.

use crate::logging::{RatioEvent, StatSummary};
use chrono::Utc;
use std::time::Instant;

pub struct RatioTelemetryAggregator {
    ratio_samples: Vec<f64>,
    output_limit_samples: Vec<f64>,
    last_sample_time: Instant,
    sample_interval_secs: f64,
}

impl RatioTelemetryAggregator {
    pub fn new(sample_interval_secs: f64) -> Self {
        Self {
            ratio_samples: Vec::new(),
            output_limit_samples: Vec::new(),
            last_sample_time: Instant::now(),
            sample_interval_secs,
        }
    }

    pub fn should_sample(&self) -> bool {
        self.last_sample_time.elapsed().as_secs_f64() >= self.sample_interval_secs
    }

    /// Record a reading and, if the interval has elapsed, emit a log event
    /// and reset the sampling timer.
    #[allow(clippy::too_many_arguments)]
    pub fn sample(
        &mut self,
        current_ratio: f32,
        output_limit: f32,
        frames_dropped: u64,
        frames_decoded: u64,
        framing_errors: u64,
    ) -> Option<RatioEvent> {
        self.ratio_samples.push(current_ratio as f64);
        self.output_limit_samples.push(output_limit as f64);

        if !self.should_sample() {
            return None;
        }

        self.last_sample_time = Instant::now();
        Some(RatioEvent {
            timestamp: Utc::now(),
            current_ratio,
            output_limit,
            frames_dropped,
            frames_decoded,
            framing_errors,
        })
    }

    pub fn ratio_statistics(&self) -> StatSummary {
        Self::compute_stat_summary(&self.ratio_samples)
    }

    fn compute_stat_summary(samples: &[f64]) -> StatSummary {
        if samples.is_empty() {
            return StatSummary { mean: 0.0, stddev: 0.0, min: 0.0, max: 0.0, samples: 0 };
        }

        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / samples.len() as f64;
        let stddev = variance.sqrt();
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        StatSummary { mean, stddev, min, max, samples: samples.len() }
    }
}
