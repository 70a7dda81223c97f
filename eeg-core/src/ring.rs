//! Lock-free single-producer single-consumer ring buffers.
//!
//! Both the input ring (source rate, written by the serial producer
//! thread) and the output ring (sink rate, written by the resampler
//! inside the audio callback) are built on the same underlying
//! structure: an [`rtrb`] ring of interleaved `f32` slots, split into a
//! non-aliasing producer half and consumer half so each execution
//! context can only touch the side it owns. This replaces the
//! "copy-shift to compact" idiom with index arithmetic internal to
//! `rtrb`'s head/tail cursors.

use rtrb::{Consumer, Producer, RingBuffer};

/// Producer half of an interleaved sample ring: owned by the context that
/// appends whole frames (one `f32` per channel) to the tail.
pub struct SampleProducer {
    inner: Producer<f32>,
    channels: usize,
}

/// Consumer half of an interleaved sample ring: owned by the context that
/// drains whole frames from the head.
pub struct SampleConsumer {
    inner: Consumer<f32>,
    channels: usize,
}

/// Construct a ring sized for `capacity_frames` frames of `channels` floats
/// each, returning non-aliasing producer and consumer handles.
pub fn sample_ring(capacity_frames: usize, channels: usize) -> (SampleProducer, SampleConsumer) {
    let (producer, consumer) = RingBuffer::<f32>::new(capacity_frames * channels);
    (
        SampleProducer { inner: producer, channels },
        SampleConsumer { inner: consumer, channels },
    )
}

impl SampleProducer {
    /// Number of whole frames that still fit without blocking.
    pub fn frames_free(&self) -> usize {
        self.inner.slots() / self.channels
    }

    /// Push one frame (`channels` floats) onto the tail. Returns `false`
    /// (pushing nothing) if there isn't room for the whole frame -- this
    /// keeps frames atomic from the consumer's point of view.
    pub fn push_frame(&mut self, frame: &[f32]) -> bool {
        debug_assert_eq!(frame.len(), self.channels);
        if self.frames_free() == 0 {
            return false;
        }
        for &v in frame {
            // Capacity was already checked above; a push failing here would
            // indicate a producer-side bug, not contention (there is only
            // one producer).
            let _ = self.inner.push(v);
        }
        true
    }
}

impl SampleConsumer {
    /// Number of whole frames currently available to read.
    pub fn frames_available(&self) -> usize {
        self.inner.slots() / self.channels
    }

    /// Pop up to `max_frames` frames, de-interleaving into `planar_out`
    /// (one `Vec<f32>` per channel, appended to). Returns the number of
    /// frames actually popped.
    pub fn pop_planar(&mut self, max_frames: usize, planar_out: &mut [Vec<f32>]) -> usize {
        debug_assert_eq!(planar_out.len(), self.channels);
        let available = self.frames_available().min(max_frames);
        for _ in 0..available {
            for ch in 0..self.channels {
                if let Ok(v) = self.inner.pop() {
                    planar_out[ch].push(v);
                }
            }
        }
        available
    }

    /// Pop up to `max_frames` interleaved frames into `out`, which must be
    /// at least `max_frames * channels` long. Returns the number of frames
    /// popped; the destination is left untouched beyond that point.
    pub fn pop_interleaved(&mut self, max_frames: usize, out: &mut [f32]) -> usize {
        let available = self.frames_available().min(max_frames);
        debug_assert!(out.len() >= available * self.channels);
        let mut idx = 0;
        for _ in 0..available {
            for _ in 0..self.channels {
                if let Ok(v) = self.inner.pop() {
                    out[idx] = v;
                    idx += 1;
                }
            }
        }
        available
    }
}

/// A plain, non-atomic frame buffer for the output ring.
///
/// The resampler writes to this and the audio callback reads from it, but
/// both happen from the same (consumer) execution context, so no
/// cross-thread synchronisation is needed here -- see the concurrency
/// notes on the output buffer.
pub struct FrameBuffer {
    data: std::collections::VecDeque<f32>,
    channels: usize,
    capacity_frames: usize,
}

impl FrameBuffer {
    pub fn new(capacity_frames: usize, channels: usize) -> Self {
        Self {
            data: std::collections::VecDeque::with_capacity(capacity_frames * channels),
            channels,
            capacity_frames,
        }
    }

    pub fn capacity_frames(&self) -> usize {
        self.capacity_frames
    }

    pub fn frames_available(&self) -> usize {
        self.data.len() / self.channels
    }

    pub fn frames_free(&self) -> usize {
        self.capacity_frames - self.frames_available()
    }

    /// Append interleaved frames, clamped to remaining capacity. Returns
    /// the number of frames actually appended.
    pub fn push_interleaved(&mut self, frames: &[f32]) -> usize {
        let incoming_frames = frames.len() / self.channels;
        let to_push = incoming_frames.min(self.frames_free());
        self.data.extend(frames[..to_push * self.channels].iter().copied());
        to_push
    }

    /// Copy up to `max_frames` from the head into `out` (interleaved),
    /// removing them from the buffer. Returns the number of frames copied.
    pub fn pop_interleaved(&mut self, max_frames: usize, out: &mut [f32]) -> usize {
        let available = self.frames_available().min(max_frames);
        for i in 0..available * self.channels {
            out[i] = self.data.pop_front().expect("checked against frames_available");
        }
        available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_pop_round_trip() {
        let (mut p, mut c) = sample_ring(4, 2);
        assert!(p.push_frame(&[1.0, 2.0]));
        assert!(p.push_frame(&[3.0, 4.0]));
        assert_eq!(c.frames_available(), 2);

        let mut planar = vec![Vec::new(), Vec::new()];
        let n = c.pop_planar(10, &mut planar);
        assert_eq!(n, 2);
        assert_eq!(planar[0], vec![1.0, 3.0]);
        assert_eq!(planar[1], vec![2.0, 4.0]);
    }

    #[test]
    fn refuses_partial_frame_push_when_full() {
        let (mut p, _c) = sample_ring(1, 2);
        assert!(p.push_frame(&[1.0, 2.0]));
        assert!(!p.push_frame(&[5.0, 6.0]));
    }

    #[test]
    fn frame_count_invariant_holds_across_interleaved_push_pop() {
        let (mut p, mut c) = sample_ring(8, 3);
        for i in 0..8 {
            assert!(p.push_frame(&[i as f32; 3]));
            assert!(c.frames_available() <= 8);
        }
        assert!(!p.push_frame(&[0.0; 3]));

        let mut out = vec![0f32; 8 * 3];
        let popped = c.pop_interleaved(5, &mut out);
        assert_eq!(popped, 5);
        assert_eq!(c.frames_available(), 3);
        assert!(p.frames_free() >= 5);
    }

    #[test]
    fn frame_buffer_respects_capacity_and_fifo_order() {
        let mut buf = FrameBuffer::new(2, 2);
        assert_eq!(buf.push_interleaved(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]), 2);
        assert_eq!(buf.frames_available(), 2);
        assert_eq!(buf.frames_free(), 0);

        let mut out = [0f32; 4];
        let popped = buf.pop_interleaved(2, &mut out);
        assert_eq!(popped, 2);
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(buf.frames_available(), 0);
    }

    #[test]
    fn frame_buffer_underrun_returns_fewer_frames_than_requested() {
        let mut buf = FrameBuffer::new(4, 8);
        let mut out = [0f32; 441 * 8];
        let popped = buf.pop_interleaved(441, &mut out);
        assert_eq!(popped, 0);
        assert!(out.iter().all(|&v| v == 0.0));
    }
}
