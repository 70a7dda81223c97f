//! Serial transport and frame source.
//!
//! Speaks 115200 8N1 to the headset over a virtual (Bluetooth SPP) or
//! physical serial port, performs the start/stop handshake, discards the
//! warmup frames, and resynchronises on framing loss instead of aborting.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use crate::decoder::{self, Sample, FRAME_SIZE};
use crate::errors::{HandshakeError, TransportError};

const START_ACQ: [u8; 3] = [0x61, 0x7C, 0x87];
const STOP_ACQ: [u8; 3] = [0x63, 0x5C, 0xC5];
const ACK: [u8; 3] = [0x00, 0x00, 0x00];

/// Default per-operation timeout for reads, writes, and the handshake.
pub const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Number of frames discarded at startup for ADC settling.
pub const WARMUP_FRAMES: usize = 5 * 250;

/// Upper bound on bytes scanned while resynchronising after a framing
/// error, expressed as a multiple of the frame size.
const RESYNC_BUDGET_FRAMES: usize = 8;

/// Capability interface the pipeline needs from a device transport.
/// Abstracts over a real serial port and, in tests, an in-memory stand-in.
pub trait SerialTransport: Read + Write + Send {}
impl<T: Read + Write + Send> SerialTransport for T {}

/// Best-effort serial port discovery: prefer a port whose name or
/// description contains "UN" (the Unicorn's typical Bluetooth SPP name),
/// falling back to the first available port. This is a hint, not a
/// discovery protocol -- an explicitly configured port always wins.
pub fn find_port_by_name_hint() -> Result<String, TransportError> {
    let ports = serialport::available_ports().map_err(|e| TransportError::Io(e.to_string()))?;
    if ports.is_empty() {
        return Err(TransportError::NoPortFound);
    }
    let preferred = ports.iter().find(|p| {
        p.port_name.contains("UN")
            || match &p.port_type {
                serialport::SerialPortType::UsbPort(info) => {
                    info.product.as_deref().unwrap_or("").contains("UN")
                }
                _ => false,
            }
    });
    Ok(preferred.unwrap_or(&ports[0]).port_name.clone())
}

/// Open a real serial connection at 115200 8N1, no flow control.
pub fn open_serial(port_identifier: &str) -> Result<Box<dyn SerialTransport>, TransportError> {
    let port = serialport::new(port_identifier, 115_200)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::None)
        .timeout(IO_TIMEOUT)
        .open()
        .map_err(|e| TransportError::Open {
            port: port_identifier.to_string(),
            reason: e.to_string(),
        })?;
    Ok(Box::new(port))
}

/// Drives the handshake, warmup, and steady-state frame pulls against a
/// transport. Generic over the transport so tests can substitute an
/// in-memory byte source/sink.
pub struct SerialSource<T: SerialTransport> {
    transport: T,
    frames_dropped: u64,
    frames_decoded: u64,
    framing_errors: u64,
}

impl<T: SerialTransport> SerialSource<T> {
    pub fn new(transport: T) -> Self {
        Self { transport, frames_dropped: 0, frames_decoded: 0, framing_errors: 0 }
    }

    /// Bytes scanned past a lost frame boundary before resync found the
    /// next start sequence, summed over the session.
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    /// Total frames successfully decoded, including those recovered by resync.
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// Number of times the initial decode of a frame-sized read failed and
    /// triggered a resync scan.
    pub fn framing_errors(&self) -> u64 {
        self.framing_errors
    }

    /// Send the start command and verify the device's acknowledgement.
    pub fn start_acquisition(&mut self) -> Result<(), HandshakeError> {
        self.write_exact_timed(&START_ACQ)
            .map_err(|_| HandshakeError::Timeout(IO_TIMEOUT))?;
        let mut ack = [0u8; 3];
        self.read_exact_timed(&mut ack)
            .map_err(|_| HandshakeError::Timeout(IO_TIMEOUT))?;
        if ack != ACK {
            return Err(HandshakeError::BadStartAck { actual: ack.to_vec() });
        }
        Ok(())
    }

    /// Send the stop command and verify the device's acknowledgement.
    pub fn stop_acquisition(&mut self) -> Result<(), HandshakeError> {
        self.write_exact_timed(&STOP_ACQ)
            .map_err(|_| HandshakeError::Timeout(IO_TIMEOUT))?;
        let mut ack = [0u8; 3];
        self.read_exact_timed(&mut ack)
            .map_err(|_| HandshakeError::Timeout(IO_TIMEOUT))?;
        if ack != ACK {
            return Err(HandshakeError::BadStopAck { actual: ack.to_vec() });
        }
        Ok(())
    }

    /// Discard [`WARMUP_FRAMES`] frames for ADC settling.
    pub fn warmup(&mut self) -> Result<(), TransportError> {
        for _ in 0..WARMUP_FRAMES {
            self.pull_frame()?;
        }
        Ok(())
    }

    /// Read and decode the next frame, resynchronising on framing loss
    /// rather than failing the session outright.
    pub fn pull_frame(&mut self) -> Result<Sample, TransportError> {
        let mut buf = [0u8; FRAME_SIZE];
        self.read_exact_timed(&mut buf)
            .map_err(|_| TransportError::Timeout { operation: "pull_frame", elapsed: IO_TIMEOUT })?;

        match decoder::decode_frame(&buf) {
            Ok(sample) => {
                self.frames_decoded += 1;
                Ok(sample)
            }
            Err(_) => {
                self.framing_errors += 1;
                self.resync_and_decode(&buf)
            }
        }
    }

    /// Scan forward for the next `0xC0 0x00` start sequence, bounded by a
    /// byte budget, then decode the frame it begins.
    ///
    /// Checks every adjacent byte pair as it's consumed -- first across the
    /// already-read `first_bytes`, then across bytes pulled fresh from the
    /// transport -- rather than discarding down to a fixed-size tail and
    /// checking once, which would walk straight past a match sitting inside
    /// the buffer already in hand.
    fn resync_and_decode(&mut self, first_bytes: &[u8; FRAME_SIZE]) -> Result<Sample, TransportError> {
        let budget = RESYNC_BUDGET_FRAMES * FRAME_SIZE;
        let mut prev: Option<u8> = None;
        let mut scanned = 0usize;

        for (i, &byte) in first_bytes.iter().enumerate() {
            scanned += 1;
            if prev == Some(0xC0) && byte == 0x00 {
                return self.complete_resync_frame(first_bytes, i, scanned);
            }
            if scanned > budget {
                return Err(TransportError::ResyncBudgetExceeded { budget_bytes: budget });
            }
            prev = Some(byte);
        }

        loop {
            let mut next = [0u8; 1];
            self.read_exact_timed(&mut next).map_err(|_| TransportError::Timeout {
                operation: "resync",
                elapsed: IO_TIMEOUT,
            })?;
            scanned += 1;
            if prev == Some(0xC0) && next[0] == 0x00 {
                let mut frame = [0u8; FRAME_SIZE];
                frame[0] = 0xC0;
                frame[1] = 0x00;
                self.read_exact_timed(&mut frame[2..]).map_err(|_| TransportError::Timeout {
                    operation: "resync",
                    elapsed: IO_TIMEOUT,
                })?;
                let sample = decoder::decode_frame(&frame)
                    .expect("resync window already matches the start sequence");
                self.frames_dropped += (scanned - 2) as u64;
                self.frames_decoded += 1;
                return Ok(sample);
            }
            if scanned > budget {
                return Err(TransportError::ResyncBudgetExceeded { budget_bytes: budget });
            }
            prev = Some(next[0]);
        }
    }

    /// Finish building a frame once the start sequence has been found at
    /// `first_bytes[match_end - 1..=match_end]`, reusing whatever trailing
    /// bytes of `first_bytes` come after the match instead of re-reading
    /// them from the transport.
    fn complete_resync_frame(
        &mut self,
        first_bytes: &[u8; FRAME_SIZE],
        match_end: usize,
        scanned: usize,
    ) -> Result<Sample, TransportError> {
        let mut frame = [0u8; FRAME_SIZE];
        frame[0] = first_bytes[match_end - 1];
        frame[1] = first_bytes[match_end];
        let leftover = &first_bytes[match_end + 1..];
        frame[2..2 + leftover.len()].copy_from_slice(leftover);
        let filled = 2 + leftover.len();
        if filled < FRAME_SIZE {
            self.read_exact_timed(&mut frame[filled..]).map_err(|_| TransportError::Timeout {
                operation: "resync",
                elapsed: IO_TIMEOUT,
            })?;
        }
        let sample = decoder::decode_frame(&frame)
            .expect("resync window already matches the start sequence");
        self.frames_dropped += (scanned - 2) as u64;
        self.frames_decoded += 1;
        Ok(sample)
    }

    fn write_exact_timed(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.transport.write_all(buf)
    }

    fn read_exact_timed(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        self.transport.read_exact(buf)
    }
}

/// Measure elapsed wall-clock time against [`IO_TIMEOUT`]; used by callers
/// that need to bound a multi-step operation (e.g. the handshake) rather
/// than a single read/write.
pub fn within_timeout(start: Instant) -> bool {
    start.elapsed() < IO_TIMEOUT
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    /// In-memory transport standing in for a serial port in tests.
    struct MockTransport {
        inbound: VecDeque<u8>,
        outbound: Vec<u8>,
    }

    impl MockTransport {
        fn new(inbound: Vec<u8>) -> Self {
            Self { inbound: inbound.into(), outbound: Vec::new() }
        }
    }

    impl Read for MockTransport {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.inbound.len());
            for slot in buf.iter_mut().take(n) {
                *slot = self.inbound.pop_front().unwrap();
            }
            if n == 0 {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no more data"));
            }
            Ok(n)
        }
    }

    impl Write for MockTransport {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.outbound.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn canonical_frame() -> Vec<u8> {
        let mut f = vec![0u8; FRAME_SIZE];
        f[0] = 0xC0;
        f[1] = 0x00;
        f
    }

    #[test]
    fn s3_handshake_happy_path() {
        let transport = MockTransport::new(ACK.to_vec());
        let mut source = SerialSource::new(transport);
        source.start_acquisition().unwrap();
        assert_eq!(source.transport.outbound, START_ACQ.to_vec());
    }

    #[test]
    fn handshake_rejects_bad_ack() {
        let transport = MockTransport::new(vec![0x01, 0x02, 0x03]);
        let mut source = SerialSource::new(transport);
        assert!(source.start_acquisition().is_err());
    }

    #[test]
    fn pull_frame_decodes_clean_stream() {
        let mut data = Vec::new();
        for _ in 0..3 {
            data.extend_from_slice(&canonical_frame());
        }
        let transport = MockTransport::new(data);
        let mut source = SerialSource::new(transport);
        for _ in 0..3 {
            source.pull_frame().unwrap();
        }
        assert_eq!(source.frames_dropped(), 0);
    }

    #[test]
    fn s7_resync_after_stray_byte() {
        let mut data = vec![0xAAu8]; // one stray byte before the real frame
        data.extend_from_slice(&canonical_frame());
        let transport = MockTransport::new(data);
        let mut source = SerialSource::new(transport);
        let result = source.pull_frame();
        assert!(result.is_ok());
        assert!(source.frames_dropped() > 0);
        assert_eq!(source.framing_errors(), 1);
        assert_eq!(source.frames_decoded(), 1);
    }

    #[test]
    fn resync_finds_start_sequence_deep_inside_failed_buffer() {
        // Several stray bytes ahead of the real frame, so the start sequence
        // falls well inside the first failed 45-byte read rather than at its
        // tail, and the bytes after it in that same read must still be used
        // as the frame body instead of re-read from the transport.
        let mut data = vec![0x11, 0x22, 0x33, 0x44, 0x55];
        data.extend_from_slice(&canonical_frame());
        let transport = MockTransport::new(data);
        let mut source = SerialSource::new(transport);
        let sample = source.pull_frame().unwrap();
        assert_eq!(sample, [0.0; 16]);
        assert!(source.frames_dropped() > 0);
    }

    #[test]
    fn resync_gives_up_past_budget() {
        let data = vec![0xFFu8; RESYNC_BUDGET_FRAMES * FRAME_SIZE + FRAME_SIZE];
        let transport = MockTransport::new(data);
        let mut source = SerialSource::new(transport);
        assert!(matches!(
            source.pull_frame(),
            Err(TransportError::ResyncBudgetExceeded { .. })
        ));
    }
}
