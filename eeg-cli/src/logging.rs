//! Structured event logging for the CLI: one JSON/logfmt/pretty line per
//! session event, independent of the core library's in-process
//! `SignalLogger` (which exists for breadcrumb-style debugging, not for a
//! human or log aggregator watching the session from outside).

use crate::config::{LogFormat, LogTarget, LoggingConfig};
use chrono::{DateTime, Utc};
use color_eyre::eyre::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    /// Periodic ratio/output-limit sample, emitted roughly once per second.
    Ratio(RatioEvent),

    /// Summary statistics emitted at shutdown.
    Statistics(StatisticsEvent),

    Info { message: String },
    Warn { message: String },
    Error { message: String, details: Option<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatioEvent {
    pub timestamp: DateTime<Utc>,
    pub current_ratio: f32,
    pub output_limit: f32,
    pub frames_dropped: u64,
    pub frames_decoded: u64,
    pub framing_errors: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsEvent {
    pub timestamp: DateTime<Utc>,
    pub duration_secs: f64,
    pub ratio: StatSummary,
    pub frames_dropped: u64,
    pub frames_decoded: u64,
    pub framing_errors: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatSummary {
    pub mean: f64,
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
    pub samples: usize,
}

pub struct StructuredLogger {
    config: LoggingConfig,
    writer: Box<dyn Write + Send>,
    start_time: DateTime<Utc>,
}

impl StructuredLogger {
    pub fn new(config: LoggingConfig) -> Result<Self> {
        let writer: Box<dyn Write + Send> = match &config.target {
            LogTarget::Stdout => Box::new(io::stdout()),
            LogTarget::Stderr => Box::new(io::stderr()),
            LogTarget::File => {
                let path = config
                    .file_path
                    .as_ref()
                    .ok_or_else(|| color_eyre::eyre::eyre!("File path required for file logging"))?;
                Box::new(BufWriter::new(File::create(path)?))
            }
        };

        Ok(Self { config, writer, start_time: Utc::now() })
    }

    pub fn log(&mut self, event: LogEvent) -> Result<()> {
        let output = match self.config.format {
            LogFormat::Json => self.format_json(&event)?,
            LogFormat::Logfmt => self.format_logfmt(&event),
            LogFormat::Pretty => self.format_pretty(&event),
        };

        writeln!(self.writer, "{output}")?;
        self.writer.flush()?;
        Ok(())
    }

    fn format_json(&self, event: &LogEvent) -> Result<String> {
        Ok(serde_json::to_string(event)?)
    }

    fn format_logfmt(&self, event: &LogEvent) -> String {
        let ts = Utc::now().to_rfc3339();
        match event {
            LogEvent::Ratio(r) => format!(
                "ts=\"{}\" type=ratio current_ratio={:.4} output_limit={:.4} frames_dropped={} frames_decoded={} framing_errors={}",
                ts, r.current_ratio, r.output_limit, r.frames_dropped, r.frames_decoded, r.framing_errors
            ),
            LogEvent::Statistics(s) => format!(
                "ts=\"{}\" type=statistics duration_secs={:.2} ratio_mean={:.4} ratio_stddev={:.4} frames_dropped={} frames_decoded={} framing_errors={}",
                ts, s.duration_secs, s.ratio.mean, s.ratio.stddev, s.frames_dropped, s.frames_decoded, s.framing_errors
            ),
            LogEvent::Info { message } => format!("ts=\"{ts}\" level=info msg=\"{message}\""),
            LogEvent::Warn { message } => format!("ts=\"{ts}\" level=warn msg=\"{message}\""),
            LogEvent::Error { message, details } => match details {
                Some(d) => format!("ts=\"{ts}\" level=error msg=\"{message}\" details=\"{d}\""),
                None => format!("ts=\"{ts}\" level=error msg=\"{message}\""),
            },
        }
    }

    fn format_pretty(&self, event: &LogEvent) -> String {
        let ts = Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");
        match event {
            LogEvent::Ratio(r) => format!(
                "[{}] RATIO: current={:.4} limit={:.4} dropped={} decoded={} framing_errors={}",
                ts, r.current_ratio, r.output_limit, r.frames_dropped, r.frames_decoded, r.framing_errors
            ),
            LogEvent::Statistics(s) => format!(
                "[{}] STATISTICS ({:.2}s): ratio μ={:.4} σ={:.4} [{:.4},{:.4}] | dropped={} decoded={} framing_errors={}",
                ts, s.duration_secs, s.ratio.mean, s.ratio.stddev, s.ratio.min, s.ratio.max,
                s.frames_dropped, s.frames_decoded, s.framing_errors
            ),
            LogEvent::Info { message } => format!("[{ts}] INFO: {message}"),
            LogEvent::Warn { message } => format!("[{ts}] WARN: {message}"),
            LogEvent::Error { message, details } => match details {
                Some(d) => format!("[{ts}] ERROR: {message} | {d}"),
                None => format!("[{ts}] ERROR: {message}"),
            },
        }
    }

    pub fn elapsed(&self) -> f64 {
        (Utc::now() - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}
