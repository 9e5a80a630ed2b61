//! In-memory AXI FIFO for running the reader without hardware.

use super::RegisterBackend;
use crate::error::{FifoError, Result};
use crate::registers::{
    DATA_OFFSET, OCCUPANCY_OFFSET, RECEIVE_LENGTH_OFFSET, RESET_KEY, RESET_OFFSET,
};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Size of the register block the mock answers for.
const BLOCK_LEN: usize = 0x100;

/// Simulated receive FIFO.
///
/// Register behaviour relative to `base`:
///
/// - data (`+0x00`) pops the oldest queued word; reading an empty FIFO fails
/// - occupancy (`+0x1C`) and receive length (`+0x24`) report the queue length,
///   unless a scripted occupancy value is pending
/// - reset (`+0x18`) empties the queue when written with the reset key
///
/// # Example
///
/// ```
/// use fifo_reader::backend::{MockFifo, RegisterBackend};
///
/// let fifo = MockFifo::new(0x4000_0000);
/// fifo.push([10, 11, 12]);
/// assert_eq!(fifo.read32(0x4000_0024).unwrap(), 3);
/// assert_eq!(fifo.read32(0x4000_0000).unwrap(), 10);
/// ```
#[derive(Debug)]
pub struct MockFifo {
    base: usize,
    state: Mutex<MockState>,
}

#[derive(Debug, Default)]
struct MockState {
    /// Words waiting in the receive FIFO
    queue: VecDeque<u32>,
    /// Occupancy values returned instead of the real queue length
    scripted_occupancy: VecDeque<u32>,
    /// Batches that "arrive" right after the next occupancy reads
    late_arrivals: VecDeque<Vec<u32>>,
    /// Counting generator: (words per occupancy read, next value)
    generator: Option<(u32, u32)>,
    /// Successful reads before every read fails
    fail_after: Option<u64>,
    /// Completed reads
    reads: u64,
    /// Occupancy register reads
    occupancy_reads: u64,
    /// Every register write, in order
    writes: Vec<(usize, u32)>,
}

impl MockFifo {
    /// Empty FIFO whose register block starts at `base`.
    pub fn new(base: usize) -> Self {
        Self {
            base,
            state: Mutex::new(MockState::default()),
        }
    }

    /// FIFO that enqueues `batch` incrementing words every time its occupancy
    /// is read, emulating a free-running producer.
    pub fn counting(base: usize, batch: u32) -> Self {
        let fifo = Self::new(base);
        fifo.state.lock().generator = Some((batch, 0));
        fifo
    }

    /// Base address of the simulated register block.
    pub fn base(&self) -> usize {
        self.base
    }

    /// Enqueue words as if the hardware produced them.
    pub fn push<I: IntoIterator<Item = u32>>(&self, samples: I) {
        self.state.lock().queue.extend(samples);
    }

    /// Return `value` from the next occupancy read instead of the queue length.
    ///
    /// Values are consumed in the order they were scripted.
    pub fn script_occupancy(&self, value: u32) {
        self.state.lock().scripted_occupancy.push_back(value);
    }

    /// Enqueue `samples` immediately after the next unclaimed occupancy read,
    /// so they land while the reader is draining.
    pub fn arrive_during_drain<I: IntoIterator<Item = u32>>(&self, samples: I) {
        self.state
            .lock()
            .late_arrivals
            .push_back(samples.into_iter().collect());
    }

    /// Fail every read after `reads` successful ones.
    pub fn fail_after(&self, reads: u64) {
        self.state.lock().fail_after = Some(reads);
    }

    /// Words still queued.
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Number of successful reads so far.
    pub fn read_count(&self) -> u64 {
        self.state.lock().reads
    }

    /// Number of occupancy register reads so far.
    pub fn occupancy_reads(&self) -> u64 {
        self.state.lock().occupancy_reads
    }

    /// Register writes performed, oldest first.
    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.state.lock().writes.clone()
    }

    fn offset(&self, address: usize) -> Option<usize> {
        address
            .checked_sub(self.base)
            .filter(|offset| *offset < BLOCK_LEN)
    }
}

impl RegisterBackend for MockFifo {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn read32(&self, address: usize) -> Result<u32> {
        let mut state = self.state.lock();

        if let Some(limit) = state.fail_after {
            if state.reads >= limit {
                return Err(FifoError::backend(address, "injected read fault"));
            }
        }

        let value = match self.offset(address) {
            Some(DATA_OFFSET) => state
                .queue
                .pop_front()
                .ok_or_else(|| FifoError::backend(address, "receive FIFO empty"))?,
            Some(OCCUPANCY_OFFSET) | Some(RECEIVE_LENGTH_OFFSET) => {
                state.occupancy_reads += 1;
                if let Some((batch, next)) = state.generator {
                    state.queue.extend((0..batch).map(|i| next.wrapping_add(i)));
                    state.generator = Some((batch, next.wrapping_add(batch)));
                }
                let occupancy = match state.scripted_occupancy.pop_front() {
                    Some(value) => value,
                    None => u32::try_from(state.queue.len()).unwrap_or(u32::MAX),
                };
                if let Some(batch) = state.late_arrivals.pop_front() {
                    state.queue.extend(batch);
                }
                occupancy
            }
            Some(_) => 0,
            None => {
                return Err(FifoError::backend(address, "outside mock register block"));
            }
        };

        state.reads += 1;
        Ok(value)
    }

    fn write32(&self, address: usize, value: u32) -> Result<()> {
        let offset = self
            .offset(address)
            .ok_or_else(|| FifoError::backend(address, "outside mock register block"))?;

        let mut state = self.state.lock();
        state.writes.push((address, value));
        if offset == RESET_OFFSET && value == RESET_KEY {
            state.queue.clear();
        }
        Ok(())
    }

    fn contains(&self, address: usize) -> bool {
        self.offset(address).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: usize = 0x4000_0000;

    #[test]
    fn test_data_reads_are_destructive() {
        let fifo = MockFifo::new(BASE);
        fifo.push([1, 2]);

        assert_eq!(fifo.read32(BASE).unwrap(), 1);
        assert_eq!(fifo.read32(BASE).unwrap(), 2);
        assert!(fifo.read32(BASE).unwrap_err().is_backend_failure());
        assert_eq!(fifo.read_count(), 2);
    }

    #[test]
    fn test_both_occupancy_registers_report_length() {
        let fifo = MockFifo::new(BASE);
        fifo.push([5, 6, 7]);

        assert_eq!(fifo.read32(BASE + RECEIVE_LENGTH_OFFSET).unwrap(), 3);
        assert_eq!(fifo.read32(BASE + OCCUPANCY_OFFSET).unwrap(), 3);
        assert_eq!(fifo.occupancy_reads(), 2);
    }

    #[test]
    fn test_scripted_occupancy_overrides_length() {
        let fifo = MockFifo::new(BASE);
        fifo.push([1, 2, 3]);
        fifo.script_occupancy(1);

        assert_eq!(fifo.read32(BASE + RECEIVE_LENGTH_OFFSET).unwrap(), 1);
        assert_eq!(fifo.read32(BASE + RECEIVE_LENGTH_OFFSET).unwrap(), 3);
    }

    #[test]
    fn test_counting_generator() {
        let fifo = MockFifo::counting(BASE, 4);

        assert_eq!(fifo.read32(BASE + RECEIVE_LENGTH_OFFSET).unwrap(), 4);
        let words: Vec<u32> = (0..4).map(|_| fifo.read32(BASE).unwrap()).collect();
        assert_eq!(words, vec![0, 1, 2, 3]);

        assert_eq!(fifo.read32(BASE + RECEIVE_LENGTH_OFFSET).unwrap(), 4);
        assert_eq!(fifo.read32(BASE).unwrap(), 4);
    }

    #[test]
    fn test_reset_key_clears_queue() {
        let fifo = MockFifo::new(BASE);
        fifo.push([1, 2, 3]);

        fifo.write32(BASE + RESET_OFFSET, 0x00).unwrap();
        assert_eq!(fifo.pending(), 3);

        fifo.write32(BASE + RESET_OFFSET, RESET_KEY).unwrap();
        assert_eq!(fifo.pending(), 0);
        assert_eq!(
            fifo.writes(),
            vec![(BASE + RESET_OFFSET, 0x00), (BASE + RESET_OFFSET, RESET_KEY)]
        );
    }

    #[test]
    fn test_fail_after() {
        let fifo = MockFifo::new(BASE);
        fifo.push([1, 2, 3]);
        fifo.fail_after(2);

        assert!(fifo.read32(BASE).is_ok());
        assert!(fifo.read32(BASE).is_ok());
        let err = fifo.read32(BASE).unwrap_err();
        assert_eq!(err, FifoError::backend(BASE, "injected read fault"));
    }

    #[test]
    fn test_window() {
        let fifo = MockFifo::new(BASE);
        assert!(fifo.contains(BASE));
        assert!(fifo.contains(BASE + 0x24));
        assert!(!fifo.contains(BASE + BLOCK_LEN));
        assert!(!fifo.contains(BASE - 4));
        assert!(fifo.read32(BASE - 4).is_err());
    }
}
