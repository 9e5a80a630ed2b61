//! Wrap-around to chronological reordering.
//!
//! For a ring of `n` slots whose most recent sample sits at `write_index`,
//! the oldest retained sample is at `write_index + 1` (mod `n`). The ordered
//! view is therefore the tail `storage[write_index + 1..]` followed by the head
//! `storage[..=write_index]`:
//!
//! ```text
//!   storage:  [ 8 | 9 | 10 | 11 | 4 | 5 | 6 | 7 ]      write_index = 3
//!                            ^ newest  ^ oldest
//!   output:   [ 4 | 5 | 6 | 7 | 8 | 9 | 10 | 11 ]
//! ```
//!
//! When `write_index == n - 1` the tail is empty and the output is the storage
//! as-is; when `write_index == 0` the tail is everything but slot 0, which
//! becomes the last element.
//!
//! Callers must hold whatever lock guards `storage` for the whole call.

use crate::error::{FifoError, Result};
use serde::Serialize;

/// Counter and cursor observed together with a linearized read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SnapshotMeta {
    /// Total samples written when the snapshot was taken
    pub sample_count: u64,
    /// Slot of the newest sample at that instant
    pub write_index: usize,
}

/// Oldest-to-newest copy of the ring, taken under the ring lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// All `capacity` slots, oldest first; unwritten slots are zero and lead
    pub samples: Vec<u32>,
    /// Cursor and counter at the time of the read
    #[serde(flatten)]
    pub meta: SnapshotMeta,
}

impl Snapshot {
    /// Only the slots that have been written, oldest first.
    pub fn recent(&self) -> &[u32] {
        let len = self.samples.len();
        let retained = self.meta.sample_count.min(len as u64) as usize;
        &self.samples[len - retained..]
    }

    /// Most recently written sample.
    pub fn newest(&self) -> Option<u32> {
        self.recent().last().copied()
    }
}

/// Copy `storage` into `out` in oldest-to-newest order.
///
/// `out.len()` must equal `storage.len()` and `write_index` must be a valid
/// slot; otherwise [`FifoError::InvalidCapacity`] is returned.
pub fn linearize_into(storage: &[u32], write_index: usize, out: &mut [u32]) -> Result<()> {
    let n = storage.len();
    if n == 0 || out.len() != n {
        return Err(FifoError::InvalidCapacity { capacity: out.len() });
    }
    if write_index >= n {
        return Err(FifoError::InvalidCapacity { capacity: n });
    }

    let split = write_index + 1;
    let tail = &storage[split..];
    let head = &storage[..split];

    out[..tail.len()].copy_from_slice(tail);
    out[tail.len()..].copy_from_slice(head);
    Ok(())
}

/// Allocate and return `storage` in oldest-to-newest order.
///
/// An out-of-range `write_index` is reduced modulo the length; an empty
/// `storage` yields an empty vector.
pub fn linearize(storage: &[u32], write_index: usize) -> Vec<u32> {
    if storage.is_empty() {
        return Vec::new();
    }
    let split = write_index % storage.len() + 1;
    let mut out = Vec::with_capacity(storage.len());
    out.extend_from_slice(&storage[split..]);
    out.extend_from_slice(&storage[..split]);
    out
}
