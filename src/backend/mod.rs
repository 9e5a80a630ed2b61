//! Register access backends.
//!
//! The acquisition loop never touches hardware directly; it goes through a
//! [`RegisterBackend`] held as `Arc<dyn RegisterBackend>`. Two backends ship
//! with the crate:
//!
//! - [`DevMemBackend`] - volatile 32-bit accesses into a `memmap2` mapping of
//!   `/dev/mem` (or any file, which is handy for tests)
//! - [`MockFifo`] - an in-memory AXI FIFO with scripted occupancy, a counting
//!   generator, and fault injection

mod devmem;
mod mock;

pub use devmem::DevMemBackend;
pub use mock::MockFifo;

use crate::error::{FifoError, Result};

/// Synchronous 32-bit register access.
///
/// Reads of the FIFO data register are destructive: each one consumes a FIFO
/// entry. Implementations must not retry internally.
pub trait RegisterBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Read the 32-bit word at `address`.
    fn read32(&self, address: usize) -> Result<u32>;

    /// Write the 32-bit word at `address`.
    ///
    /// Only the optional FIFO reset path writes. Read-only backends keep the
    /// default, which reports the write as a register failure.
    fn write32(&self, address: usize, value: u32) -> Result<()> {
        let _ = value;
        Err(FifoError::backend(
            address,
            format!("{} backend does not support writes", self.name()),
        ))
    }

    /// Whether `address` can be accessed through this backend.
    fn contains(&self, address: usize) -> bool {
        let _ = address;
        true
    }
}
