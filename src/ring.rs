//! Fixed-capacity PCM history shared by the capture side and the match worker.
//!
//! Appends never block on readers and never fail: once the ring is full the
//! oldest samples are overwritten. A single mutex covers both the append and
//! the copy-out, so a reader always sees a contiguous, consistent tail.

use std::sync::Mutex;

use ringbuf::traits::*;
use ringbuf::HeapRb;

use crate::error::{Error, Result};
use crate::preprocess::decode_pcm16_le;

pub struct SampleRing {
    inner: Mutex<HeapRb<i16>>,
    capacity: usize,
}

impl SampleRing {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::Config("ring capacity must be positive".into()));
        }
        Ok(Self {
            inner: Mutex::new(HeapRb::new(capacity)),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends samples, overwriting the oldest once full
    pub fn append(&self, samples: &[i16]) {
        let tail = &samples[samples.len().saturating_sub(self.capacity)..];
        if let Ok(mut rb) = self.inner.lock() {
            rb.push_slice_overwrite(tail);
        }
    }

    /// Decodes little-endian PCM and appends it. Returns the sample count.
    pub fn append_pcm_le(&self, bytes: &[u8], scratch: &mut Vec<i16>) -> usize {
        decode_pcm16_le(bytes, scratch);
        self.append(scratch);
        scratch.len()
    }

    /// Copies the most recent `count` samples into `out`, oldest first.
    /// Fewer are copied when the ring holds fewer. Returns the number copied.
    pub fn recent_into(&self, count: usize, out: &mut Vec<i16>) -> usize {
        out.clear();
        let Ok(rb) = self.inner.lock() else {
            return 0;
        };

        let (head, wrapped) = rb.as_slices();
        let held = head.len() + wrapped.len();
        let skip = held - count.min(held);

        if skip < head.len() {
            out.extend_from_slice(&head[skip..]);
            out.extend_from_slice(wrapped);
        } else {
            out.extend_from_slice(&wrapped[skip - head.len()..]);
        }
        out.len()
    }

    /// Most recent `count` samples, oldest first
    pub fn recent(&self, count: usize) -> Vec<i16> {
        let mut out = Vec::with_capacity(count.min(self.capacity));
        self.recent_into(count, &mut out);
        out
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|rb| rb.occupied_len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once the ring has wrapped at least once
    pub fn is_filled(&self) -> bool {
        self.inner.lock().map(|rb| rb.is_full()).unwrap_or(false)
    }

    /// Discards every held sample; the storage is kept for reuse
    pub fn clear(&self) {
        if let Ok(mut rb) = self.inner.lock() {
            Consumer::clear(&mut *rb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(range: std::ops::Range<i32>) -> Vec<i16> {
        range.map(|v| v as i16).collect()
    }

    #[test]
    fn keeps_most_recent_after_overflow() {
        let ring = SampleRing::new(4000).unwrap();
        let samples = ramp(0..10_000);
        for chunk in samples.chunks(700) {
            ring.append(chunk);
        }

        assert!(ring.is_filled());
        assert_eq!(ring.len(), 4000);
        assert_eq!(ring.recent(1000), ramp(9000..10_000));
        assert_eq!(ring.recent(4000), ramp(6000..10_000));
    }

    #[test]
    fn returns_fewer_when_underfilled() {
        let ring = SampleRing::new(100).unwrap();
        ring.append(&[1, 2, 3]);
        assert!(!ring.is_filled());
        assert_eq!(ring.recent(10), vec![1, 2, 3]);
        assert_eq!(ring.recent(2), vec![2, 3]);
    }

    #[test]
    fn oversized_append_keeps_tail() {
        let ring = SampleRing::new(5).unwrap();
        ring.append(&ramp(0..12));
        assert_eq!(ring.recent(5), ramp(7..12));
    }

    #[test]
    fn appends_pcm_bytes() {
        let ring = SampleRing::new(8).unwrap();
        let mut scratch = Vec::new();
        let n = ring.append_pcm_le(&[0x02, 0x00, 0xfe, 0xff], &mut scratch);
        assert_eq!(n, 2);
        assert_eq!(ring.recent(2), vec![2, -2]);
    }

    #[test]
    fn clear_empties_ring() {
        let ring = SampleRing::new(8).unwrap();
        ring.append(&[1, 2]);
        ring.clear();
        assert!(ring.is_empty());
        assert!(!ring.is_filled());
        assert!(SampleRing::new(0).is_err());
    }

    #[test]
    fn refills_in_order_after_clear() {
        let ring = SampleRing::new(6).unwrap();
        ring.append(&ramp(0..9));
        ring.clear();

        ring.append(&ramp(20..24));
        assert_eq!(ring.len(), 4);
        assert_eq!(ring.recent(6), ramp(20..24));
        ring.append(&ramp(24..27));
        assert_eq!(ring.recent(6), ramp(21..27));
    }
}
