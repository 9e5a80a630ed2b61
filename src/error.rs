//! Error types for FIFO reader operations.
//!
//! `FifoError` covers every failure the reader reports:
//!
//! - **`InvalidAddress`**: `configure` was given an address the register map
//!   cannot live at (zero, misaligned, overflowing, or outside the backend's
//!   mapped window). Also returned by `start` when no address was configured.
//! - **`AlreadyRunning`**: `start` or `configure` was called while an
//!   acquisition loop is active.
//! - **`BackendReadFailure`**: a register access did not complete. Raised on
//!   the acquisition thread and surfaced through the controller's
//!   `last_error()` and `Faulted` state.
//! - **`InvalidCapacity`**: a zero-sized ring, or an output buffer whose length
//!   does not match the ring capacity.
//! - **`Config`** / **`Io`**: configuration loading and device mapping.
//!
//! The enum is `Clone` so the acquisition thread can publish the last fault
//! while still logging it; I/O errors are therefore kept as messages.

use thiserror::Error;

/// Result type alias for FIFO reader operations.
pub type Result<T> = std::result::Result<T, FifoError>;

/// Errors that can occur while configuring or running a FIFO reader.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FifoError {
    /// The FIFO base address cannot be used.
    #[error("Invalid FIFO address {address:#x}: {reason}")]
    InvalidAddress {
        /// Address passed by the caller
        address: usize,
        /// Why it was rejected
        reason: String,
    },

    /// An acquisition loop is already active.
    #[error("Acquisition is already running")]
    AlreadyRunning,

    /// A register read (or reset write) did not complete.
    #[error("Register access at {address:#x} failed: {message}")]
    BackendReadFailure {
        /// Absolute register address
        address: usize,
        /// Backend-specific description
        message: String,
    },

    /// Ring capacity or output length is unusable.
    #[error("Invalid capacity {capacity}: ring buffers need at least one slot and matching output storage")]
    InvalidCapacity {
        /// Offending capacity or length
        capacity: usize,
    },

    /// Configuration could not be loaded or failed validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operating system I/O error (opening or mapping the register device).
    #[error("I/O error: {0}")]
    Io(String),
}

impl FifoError {
    /// Shorthand for a backend failure at `address`.
    pub fn backend(address: usize, message: impl Into<String>) -> Self {
        Self::BackendReadFailure {
            address,
            message: message.into(),
        }
    }

    /// Shorthand for an address rejection.
    pub(crate) fn invalid_address(address: usize, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address,
            reason: reason.into(),
        }
    }

    /// Check if this error came from the register backend.
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, Self::BackendReadFailure { .. })
    }
}

impl From<std::io::Error> for FifoError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<figment::Error> for FifoError {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}
