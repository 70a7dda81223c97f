//! Non-audio sinks: a tab-separated text dump and an in-process
//! streaming-bus broadcast, both carrying the same per-channel metadata
//! (label, unit, type) a streaming-bus consumer would need to make sense
//! of the 16 decoded channels without re-deriving the device's layout.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rand::Rng;

use crate::decoder::Sample;
use crate::errors::ConfigError;

/// Real entropy source for [`BusSession::new`]'s `uid_source` parameter.
/// Kept separate from the constructor itself so tests can pass a
/// deterministic closure instead.
pub fn random_uid_source() -> [u8; 8] {
    rand::thread_rng().gen()
}

/// Channel labels in decode order, matching the device's 16-channel frame layout.
pub const CHANNEL_LABELS: [&str; 16] = [
    "eeg1", "eeg2", "eeg3", "eeg4", "eeg5", "eeg6", "eeg7", "eeg8", "accelX", "accelY", "accelZ",
    "gyroX", "gyroY", "gyroZ", "battery", "counter",
];

/// Physical unit per channel, in the same order as [`CHANNEL_LABELS`].
pub const CHANNEL_UNITS: [&str; 16] = [
    "uV", "uV", "uV", "uV", "uV", "uV", "uV", "uV", "g", "g", "g", "deg/s", "deg/s", "deg/s",
    "percent", "integer",
];

/// Channel grouping, in the same order as [`CHANNEL_LABELS`].
pub const CHANNEL_TYPES: [&str; 16] = [
    "EEG", "EEG", "EEG", "EEG", "EEG", "EEG", "EEG", "EEG", "ACCEL", "ACCEL", "ACCEL", "GYRO",
    "GYRO", "GYRO", "BATTERY", "COUNTER",
];

/// Appends one tab-separated line per sample to a file, with a header row
/// naming the 16 channels. Meant for offline inspection, not for the
/// real-time audio path.
pub struct TextSink {
    writer: BufWriter<File>,
}

impl TextSink {
    pub fn create(path: &Path) -> Result<Self, ConfigError> {
        let file = File::create(path).map_err(|_| ConfigError::MissingTextPath)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", CHANNEL_LABELS.join("\t")).ok();
        Ok(Self { writer })
    }

    pub fn write_sample(&mut self, sample: &Sample) -> std::io::Result<()> {
        let line = sample
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("\t");
        writeln!(self.writer, "{line}")
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

/// Per-channel metadata advertised on the streaming bus, independent of
/// any particular transport (a real implementation would publish this
/// once per session alongside the sample stream).
#[derive(Debug, Clone)]
pub struct ChannelMetadata {
    pub label: &'static str,
    pub unit: &'static str,
    pub channel_type: &'static str,
}

/// Describes a streaming-bus session: a random identifier plus the
/// per-channel metadata consumers need, generated once at session start.
#[derive(Debug, Clone)]
pub struct BusSession {
    pub session_id: String,
    pub channels: Vec<ChannelMetadata>,
}

impl BusSession {
    /// Build a new session descriptor. `uid_source` supplies the random
    /// bytes for the session id, so tests can make it deterministic.
    pub fn new(uid_source: impl Fn() -> [u8; 8]) -> Self {
        let channels = (0..16)
            .map(|i| ChannelMetadata {
                label: CHANNEL_LABELS[i],
                unit: CHANNEL_UNITS[i],
                channel_type: CHANNEL_TYPES[i],
            })
            .collect();
        Self { session_id: random_uid_string(uid_source()), channels }
    }
}

/// In-process broadcast sink: publishes decoded samples to any number of
/// subscribers via a bounded channel, dropping the oldest reader's
/// backlog rather than blocking the producer when a subscriber lags.
pub struct BusSink {
    session: BusSession,
    sender: std::sync::mpsc::SyncSender<Sample>,
}

impl BusSink {
    pub fn new(session: BusSession, capacity: usize) -> (Self, std::sync::mpsc::Receiver<Sample>) {
        let (sender, receiver) = std::sync::mpsc::sync_channel(capacity);
        (Self { session, sender }, receiver)
    }

    pub fn session(&self) -> &BusSession {
        &self.session
    }

    /// Publish a sample, silently dropping it if the channel is full.
    pub fn publish(&self, sample: Sample) {
        let _ = self.sender.try_send(sample);
    }
}

fn random_uid_string(bytes: [u8; 8]) -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    bytes.iter().map(|b| ALPHABET[*b as usize % ALPHABET.len()] as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_session_carries_all_sixteen_channels() {
        let session = BusSession::new(|| [0u8; 8]);
        assert_eq!(session.channels.len(), 16);
        assert_eq!(session.channels[0].label, "eeg1");
        assert_eq!(session.channels[15].channel_type, "COUNTER");
    }

    #[test]
    fn random_uid_source_produces_a_usable_session_id() {
        let session = BusSession::new(random_uid_source);
        assert_eq!(session.session_id.len(), 8);
    }

    #[test]
    fn bus_session_ids_differ_for_different_sources() {
        let a = BusSession::new(|| [1u8; 8]);
        let b = BusSession::new(|| [2u8; 8]);
        assert_ne!(a.session_id, b.session_id);
        assert_eq!(a.session_id.len(), 8);
    }

    #[test]
    fn bus_sink_drops_rather_than_blocks_when_full() {
        let (sink, receiver) = BusSink::new(BusSession::new(|| [0u8; 8]), 1);
        sink.publish([0.0; 16]);
        sink.publish([1.0; 16]); // receiver hasn't drained yet; this is dropped
        let first = receiver.try_recv().unwrap();
        assert_eq!(first, [0.0; 16]);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn text_sink_writes_header_and_tab_separated_rows() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("eeg_text_sink_test_{}.tsv", std::process::id()));
        {
            let mut sink = TextSink::create(&path).unwrap();
            sink.write_sample(&[0.0; 16]).unwrap();
            sink.flush().unwrap();
        }
        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next().unwrap(), CHANNEL_LABELS.join("\t"));
        assert!(lines.next().unwrap().starts_with('0'));
        std::fs::remove_file(&path).ok();
    }
}
