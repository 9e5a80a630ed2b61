//! Fixed-capacity circular store of the most recent samples.
//!
//! `SampleRing` keeps a write cursor pointing at the most recently written
//! slot. A write lands in `(write_index + 1) % capacity`, so the very first
//! sample goes to slot 1 (slot 0 for a single-slot ring) and the oldest
//! retained sample always sits just after the cursor.
//!
//! The ring itself has no interior locking; the controller wraps it in a
//! `parking_lot::Mutex` and holds that lock for a whole poll cycle's batch of
//! writes and for a whole snapshot.

use crate::error::{FifoError, Result};
use crate::linearize::{self, Snapshot, SnapshotMeta};

/// Circular buffer of `u32` samples.
#[derive(Debug, Clone)]
pub struct SampleRing {
    /// Slot storage, zeroed until written
    storage: Vec<u32>,
    /// Slot holding the most recent sample
    write_index: usize,
    /// Samples written since creation (wraps at u64)
    sample_count: u64,
}

impl SampleRing {
    /// Create a zeroed ring holding `capacity` samples.
    ///
    /// Returns [`FifoError::InvalidCapacity`] when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(FifoError::InvalidCapacity { capacity });
        }

        Ok(Self {
            storage: vec![0; capacity],
            write_index: 0,
            sample_count: 0,
        })
    }

    /// Store one sample, overwriting the oldest slot once full.
    #[inline]
    pub fn write(&mut self, sample: u32) {
        self.write_index = (self.write_index + 1) % self.storage.len();
        self.storage[self.write_index] = sample;
        self.sample_count = self.sample_count.wrapping_add(1);
    }

    /// Store every sample from `samples` in order.
    pub fn extend<I: IntoIterator<Item = u32>>(&mut self, samples: I) {
        for sample in samples {
            self.write(sample);
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Slot holding the most recently written sample.
    pub fn write_index(&self) -> usize {
        self.write_index
    }

    /// Total samples written (wrapping).
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Number of slots holding written samples.
    pub fn retained(&self) -> usize {
        // usize -> u64 never truncates on supported targets
        self.sample_count.min(self.storage.len() as u64) as usize
    }

    /// Raw slot contents in storage order (not chronological).
    pub fn as_slice(&self) -> &[u32] {
        &self.storage
    }

    /// Copy the contents into `out`, oldest first.
    ///
    /// `out` must be exactly `capacity()` long.
    pub fn linearize_into(&self, out: &mut [u32]) -> Result<()> {
        linearize::linearize_into(&self.storage, self.write_index, out)
    }

    /// Chronological copy of the contents, oldest first.
    pub fn to_vec(&self) -> Vec<u32> {
        linearize::linearize(&self.storage, self.write_index)
    }

    /// Counter and cursor as one value.
    pub fn meta(&self) -> SnapshotMeta {
        SnapshotMeta {
            sample_count: self.sample_count,
            write_index: self.write_index,
        }
    }

    /// Linearized copy together with the counter and cursor it reflects.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            samples: self.to_vec(),
            meta: self.meta(),
        }
    }

    /// Zero all slots and reset the cursor and counter.
    pub fn clear(&mut self) {
        self.storage.fill(0);
        self.write_index = 0;
        self.sample_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        let result = SampleRing::new(0);
        assert_eq!(result.unwrap_err(), FifoError::InvalidCapacity { capacity: 0 });
    }

    #[test]
    fn test_first_write_lands_after_cursor() {
        let mut ring = SampleRing::new(4).unwrap();
        assert_eq!(ring.write_index(), 0);

        ring.write(7);
        assert_eq!(ring.write_index(), 1);
        assert_eq!(ring.as_slice(), &[0, 7, 0, 0]);
        assert_eq!(ring.sample_count(), 1);
        assert_eq!(ring.retained(), 1);
    }

    #[test]
    fn test_cursor_wraps_through_slot_zero() {
        let mut ring = SampleRing::new(4).unwrap();
        ring.extend(1..=4);

        // Slots 1, 2, 3 then back to 0
        assert_eq!(ring.write_index(), 0);
        assert_eq!(ring.as_slice(), &[4, 1, 2, 3]);

        ring.write(5);
        assert_eq!(ring.write_index(), 1);
        assert_eq!(ring.as_slice(), &[4, 5, 2, 3]);
        assert_eq!(ring.retained(), 4);
        assert_eq!(ring.sample_count(), 5);
    }

    #[test]
    fn test_single_slot_ring() {
        let mut ring = SampleRing::new(1).unwrap();
        ring.extend([1, 2, 3]);
        assert_eq!(ring.write_index(), 0);
        assert_eq!(ring.to_vec(), vec![3]);
    }

    #[test]
    fn test_partial_fill_leaves_zeros_first() {
        let mut ring = SampleRing::new(8).unwrap();
        ring.extend([1, 2, 3]);
        assert_eq!(ring.to_vec(), vec![0, 0, 0, 0, 0, 1, 2, 3]);
    }

    #[test]
    fn test_clear() {
        let mut ring = SampleRing::new(3).unwrap();
        ring.extend(10..20);
        ring.clear();

        assert_eq!(ring.sample_count(), 0);
        assert_eq!(ring.write_index(), 0);
        assert_eq!(ring.as_slice(), &[0, 0, 0]);
    }

    #[test]
    fn test_sample_count_wraps() {
        let mut ring = SampleRing::new(2).unwrap();
        ring.sample_count = u64::MAX;
        ring.write(1);
        assert_eq!(ring.sample_count(), 0);
    }
}
