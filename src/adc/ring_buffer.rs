// SpikeTag — Sample Ring Buffer
//
// Fixed-capacity circular store of the most recent samples.  Writes never
// fail: once full, every push overwrites the oldest sample.  The producer is
// the only writer; the detector is the only reader.  Both go through the
// mutex in `SharedRing`, holding it only for the cursor update (producer) or
// one scan + copy (detector).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::RING_CAPACITY;
use crate::events::Sample;

pub struct RingBuffer<const N: usize> {
    buf: [Sample; N],
    /// Next slot to write.
    head: usize,
    /// Valid samples currently held (0..=N).
    count: usize,
    /// Samples pushed since the last reset. Slot of sequence `s` is `s % N`.
    written: u64,
}

/// The ring used by the pipeline.
pub type SampleRing = RingBuffer<RING_CAPACITY>;

/// Producer/detector handle to the pipeline's ring.
pub type SharedRing = Arc<Mutex<SampleRing>>;

pub fn shared_ring() -> SharedRing {
    Arc::new(Mutex::new(SampleRing::new()))
}

/// Lock the ring. A panic elsewhere cannot leave the ring inconsistent
/// (every mutation is a single slot write plus cursor bump), so poisoning is
/// ignored.
pub fn lock_ring(ring: &SharedRing) -> MutexGuard<'_, SampleRing> {
    ring.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<const N: usize> RingBuffer<N> {
    pub const fn new() -> Self {
        Self {
            buf: [0; N],
            head: 0,
            count: 0,
            written: 0,
        }
    }

    /// O(1). Overwrites the oldest sample once full.
    pub fn push(&mut self, sample: Sample) {
        self.buf[self.head] = sample;
        self.head = (self.head + 1) % N;
        if self.count < N {
            self.count += 1;
        }
        self.written += 1;
    }

    pub fn extend_from_slice(&mut self, samples: &[Sample]) {
        for &s in samples {
            self.push(s);
        }
    }

    /// Drop all samples and rewind the cursors.
    pub fn reset(&mut self) {
        self.head = 0;
        self.count = 0;
        self.written = 0;
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == N
    }

    /// Slot the next sample will be written to.
    pub fn head(&self) -> usize {
        self.head
    }

    /// Total samples pushed since the last reset.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Sequence number of the oldest valid sample.
    pub fn oldest_seq(&self) -> u64 {
        self.written - self.count as u64
    }

    pub fn slot_of(seq: u64) -> usize {
        (seq % N as u64) as usize
    }

    /// Copy `length` samples centred on `center` into `out`, oldest first.
    ///
    /// The window starts `length / 2` slots before `center` (wrapping) and
    /// runs for `length` slots.  Returns `None`, leaving `out` untouched, when
    /// fewer than `length` samples are held or `out` is too short.
    pub fn read_window<'a>(&self, center: usize, length: usize, out: &'a mut [Sample]) -> Option<&'a [Sample]> {
        if length == 0 || length > N || self.count < length || out.len() < length {
            return None;
        }

        let start = (center % N + N - length / 2) % N;
        let first = length.min(N - start);
        out[..first].copy_from_slice(&self.buf[start..start + first]);
        out[first..length].copy_from_slice(&self.buf[..length - first]);
        Some(&out[..length])
    }

    /// Slot of the first sample with |value| above `threshold_mv`, scanning
    /// at most `search_length` slots forward from `start_offset`.
    pub fn find_trigger(&self, start_offset: usize, search_length: usize, threshold_mv: u16) -> Option<usize> {
        let threshold = u32::from(threshold_mv);
        (0..search_length.min(N))
            .map(|i| (start_offset + i) % N)
            .find(|&slot| self.buf[slot].unsigned_abs() > threshold)
    }

    /// Chronological copy of the held samples, for observers that must not
    /// keep a live reference.
    pub fn snapshot(&self) -> Vec<Sample> {
        let start = Self::slot_of(self.oldest_seq());
        (0..self.count).map(|i| self.buf[(start + i) % N]).collect()
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp<const N: usize>(ring: &mut RingBuffer<N>, n: i32) {
        for v in 0..n {
            ring.push(v);
        }
    }

    #[test]
    fn overwrite_keeps_most_recent_capacity_samples() {
        let mut ring = RingBuffer::<8>::new();
        ramp(&mut ring, 8 + 5);

        assert!(ring.is_full());
        assert_eq!(ring.len(), 8);
        assert_eq!(ring.snapshot(), (5..13).collect::<Vec<_>>());
        assert_eq!(ring.oldest_seq(), 5);
    }

    #[test]
    fn count_grows_until_capacity() {
        let mut ring = RingBuffer::<4>::new();
        assert!(ring.is_empty());
        ring.push(1);
        ring.push(2);
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.head(), 2);
        ramp(&mut ring, 10);
        assert_eq!(ring.len(), 4);
    }

    #[test]
    fn window_is_contiguous_ramp_slice() {
        let mut ring = RingBuffer::<16>::new();
        ramp(&mut ring, 16);
        let mut out = [0; 16];

        let window = ring.read_window(8, 6, &mut out).unwrap();
        assert_eq!(window, &[5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn window_wraps_around_the_end() {
        let mut ring = RingBuffer::<10>::new();
        ramp(&mut ring, 25); // slots hold 20..25 at 0..5, 15..20 at 5..10
        let mut out = [0; 10];

        // value 21 lives in slot 1
        let window = ring.read_window(1, 6, &mut out).unwrap();
        assert_eq!(window, &[18, 19, 20, 21, 22, 23]);
    }

    #[test]
    fn window_fails_cleanly_without_enough_samples() {
        let mut ring = RingBuffer::<10>::new();
        ramp(&mut ring, 5);
        let mut out = [-1; 10];

        assert!(ring.read_window(3, 6, &mut out).is_none());
        assert!(out.iter().all(|&v| v == -1));
        assert!(ring.read_window(3, 5, &mut out).is_some());
    }

    #[test]
    fn window_rejects_short_output() {
        let mut ring = RingBuffer::<10>::new();
        ramp(&mut ring, 10);
        let mut out = [0; 4];
        assert!(ring.read_window(5, 6, &mut out).is_none());
    }

    #[test]
    fn find_trigger_uses_absolute_value() {
        let mut ring = RingBuffer::<10>::new();
        for v in [0, 10, -150, 0, 200, 0] {
            ring.push(v);
        }
        assert_eq!(ring.find_trigger(0, 6, 100), Some(2));
        assert_eq!(ring.find_trigger(3, 3, 100), Some(4));
        assert_eq!(ring.find_trigger(0, 6, 200), None);
    }

    #[test]
    fn find_trigger_handles_extreme_samples() {
        let mut ring = RingBuffer::<4>::new();
        for v in [0, Sample::MIN, 0, Sample::MAX] {
            ring.push(v);
        }
        assert_eq!(ring.find_trigger(0, 4, 2000), Some(1));
        assert_eq!(ring.find_trigger(2, 2, 2000), Some(3));
    }

    #[test]
    fn find_trigger_wraps_and_respects_length() {
        let mut ring = RingBuffer::<6>::new();
        for v in [500, 0, 0, 0, 0, 0] {
            ring.push(v);
        }
        assert_eq!(ring.find_trigger(4, 3, 100), Some(0));
        assert_eq!(ring.find_trigger(4, 2, 100), None);
    }

    #[test]
    fn reset_rewinds_everything() {
        let mut ring = RingBuffer::<4>::new();
        ramp(&mut ring, 9);
        ring.reset();
        assert!(ring.is_empty());
        assert_eq!(ring.head(), 0);
        assert_eq!(ring.written(), 0);
        assert!(ring.snapshot().is_empty());
    }
}
