//! # FIFO Reader
//!
//! Continuously polls a memory-mapped FPGA FIFO from a background thread and
//! keeps the most recent `N` samples in a ring buffer that foreground threads
//! can read at any time, oldest first, without pausing acquisition.
//!
//! ## Crate Structure
//!
//! - **`backend`**: the [`RegisterBackend`] trait plus the `/dev/mem`
//!   ([`DevMemBackend`]) and in-memory ([`MockFifo`]) implementations.
//! - **`registers`**: AXI FIFO MM-S register offsets and occupancy selection.
//! - **`ring_buffer`**: [`SampleRing`], the fixed-capacity circular store.
//! - **`linearize`**: wrap-around to oldest-to-newest reordering and the
//!   [`Snapshot`] type.
//! - **`acquisition`**: the polling loop, its state and counters.
//! - **`controller`**: [`FifoReader`], which ties the pieces together.
//! - **`config`**: Figment-based TOML + environment configuration.
//! - **`logging`**: `tracing-subscriber` initialisation for binaries.
//! - **`error`**: the [`FifoError`] taxonomy.
//!
//! ## Example
//!
//! ```no_run
//! use fifo_reader::{DevMemBackend, FifoReader};
//! use std::sync::Arc;
//!
//! let base = 0x43C1_0000;
//! let backend = Arc::new(DevMemBackend::open("/dev/mem", base, 0x1000)?);
//! let reader = FifoReader::new(backend, 4096)?;
//! reader.configure(base)?;
//! reader.start(1000)?;
//!
//! let window = reader.get_data(); // 4096 samples, oldest first
//! # drop(window);
//! reader.stop_and_wait();
//! # Ok::<(), fifo_reader::FifoError>(())
//! ```

pub mod acquisition;
pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod linearize;
pub mod logging;
pub mod registers;
pub mod ring_buffer;

pub use acquisition::{AcquisitionState, AcquisitionStats};
pub use backend::{DevMemBackend, MockFifo, RegisterBackend};
pub use config::ReaderConfig;
pub use controller::{FifoReader, ReaderOptions};
pub use error::{FifoError, Result};
pub use linearize::{Snapshot, SnapshotMeta};
pub use registers::OccupancyRegister;
pub use ring_buffer::SampleRing;
