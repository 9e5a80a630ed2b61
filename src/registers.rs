//! AXI FIFO MM-S receive-side register map.
//!
//! Offsets are relative to the FIFO base address passed to
//! [`FifoReader::configure`](crate::FifoReader::configure). See Xilinx PG080
//! for the full register description.
//!
//! The polling loop reads samples from the base address itself and reads the
//! drain target from whichever occupancy register is selected.

use serde::{Deserialize, Serialize};

/// Data register used by the polling loop (destructive read).
pub const DATA_OFFSET: usize = 0x00;

/// Receive FIFO reset register (RDFR).
pub const RESET_OFFSET: usize = 0x18;

/// Receive FIFO occupancy register (RDFO).
pub const OCCUPANCY_OFFSET: usize = 0x1C;

/// Receive FIFO data port (RDFD) in the AXI4-Lite map. Not read by the loop,
/// which drains through [`DATA_OFFSET`].
pub const DATA_PORT_OFFSET: usize = 0x20;

/// Receive length register (RLR).
pub const RECEIVE_LENGTH_OFFSET: usize = 0x24;

/// Value written to [`RESET_OFFSET`] to reset the receive FIFO.
pub const RESET_KEY: u32 = 0xA5;

/// Highest offset touched by the reader; used for address range checks.
pub const MAX_OFFSET: usize = RECEIVE_LENGTH_OFFSET;

/// Register the loop reads to learn how many words to drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyRegister {
    /// Receive length register (RLR, base + 0x24)
    #[default]
    ReceiveLength,
    /// Receive FIFO occupancy register (RDFO, base + 0x1C)
    Occupancy,
}

impl OccupancyRegister {
    /// Offset of this register from the FIFO base.
    pub fn offset(self) -> usize {
        match self {
            Self::ReceiveLength => RECEIVE_LENGTH_OFFSET,
            Self::Occupancy => OCCUPANCY_OFFSET,
        }
    }
}

/// Absolute addresses of the registers used by one configured FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FifoRegisters {
    /// Base address of the FIFO block
    pub base: usize,
    /// Occupancy register selected for the drain target
    pub occupancy: OccupancyRegister,
}

impl FifoRegisters {
    /// Register set rooted at `base`.
    pub fn new(base: usize, occupancy: OccupancyRegister) -> Self {
        Self { base, occupancy }
    }

    /// Address of the data register.
    pub fn data(&self) -> usize {
        self.base + DATA_OFFSET
    }

    /// Address of the selected occupancy register.
    pub fn occupancy(&self) -> usize {
        self.base + self.occupancy.offset()
    }

    /// Address of the reset register.
    pub fn reset(&self) -> usize {
        self.base + RESET_OFFSET
    }

    /// Every address the reader may touch for this FIFO.
    pub fn used(&self) -> [usize; 3] {
        [self.data(), self.occupancy(), self.reset()]
    }
}
