//! Background polling loop.
//!
//! Each cycle reads the selected occupancy register once, then drains exactly
//! that many words from the data register into the ring while holding the
//! ring lock, then sleeps for the configured period. Words the hardware
//! enqueues while a drain is in progress are picked up on the next cycle; the
//! occupancy reading is a fixed target, not a live bound.
//!
//! Stopping is cooperative. The run flag is checked once per cycle, so a stop
//! request takes effect after at most one full drain plus one period. The
//! sleep is a `park_timeout`, and the controller unparks the thread when it
//! clears the flag, so in practice the period part is cut short.
//!
//! A register failure ends the loop: whatever was drained before the failure
//! stays in the ring, the error is logged and stored in [`AcquisitionStatus`],
//! and the state becomes [`AcquisitionState::Faulted`].

use crate::backend::RegisterBackend;
use crate::error::{FifoError, Result};
use crate::registers::FifoRegisters;
use crate::ring_buffer::SampleRing;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Lifecycle of the acquisition loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionState {
    /// No loop is running
    Idle,
    /// A loop is polling the FIFO
    Running,
    /// The last loop stopped on a register failure
    Faulted,
}

impl AcquisitionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Faulted,
            _ => Self::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Running => 1,
            Self::Faulted => 2,
        }
    }
}

/// Counters snapshot for the acquisition loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AcquisitionStats {
    /// Current loop state
    pub state: AcquisitionState,
    /// Completed poll cycles
    pub cycles: u64,
    /// Words drained into the ring
    pub samples_drained: u64,
    /// Largest occupancy reported in a single cycle
    pub max_occupancy: u32,
    /// Cycles whose drain was shortened by the per-cycle cap
    pub truncated_cycles: u64,
}

/// State shared between the controller and the loop thread.
#[derive(Debug)]
pub struct AcquisitionStatus {
    state: AtomicU8,
    last_error: Mutex<Option<FifoError>>,
    cycles: AtomicU64,
    samples_drained: AtomicU64,
    max_occupancy: AtomicU32,
    truncated_cycles: AtomicU64,
}

impl Default for AcquisitionStatus {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(AcquisitionState::Idle.as_u8()),
            last_error: Mutex::new(None),
            cycles: AtomicU64::new(0),
            samples_drained: AtomicU64::new(0),
            max_occupancy: AtomicU32::new(0),
            truncated_cycles: AtomicU64::new(0),
        }
    }
}

impl AcquisitionStatus {
    /// Current state.
    pub fn state(&self) -> AcquisitionState {
        AcquisitionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Most recent loop failure, if any.
    pub fn last_error(&self) -> Option<FifoError> {
        self.last_error.lock().clone()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> AcquisitionStats {
        AcquisitionStats {
            state: self.state(),
            cycles: self.cycles.load(Ordering::Relaxed),
            samples_drained: self.samples_drained.load(Ordering::Relaxed),
            max_occupancy: self.max_occupancy.load(Ordering::Relaxed),
            truncated_cycles: self.truncated_cycles.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn set_state(&self, state: AcquisitionState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    /// Move `from` -> `to` only if the state is still `from`.
    pub(crate) fn transition(&self, from: AcquisitionState, to: AcquisitionState) -> bool {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn clear_error(&self) {
        *self.last_error.lock() = None;
    }

    fn record(&self, report: &CycleReport) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.samples_drained
            .fetch_add(u64::from(report.drained), Ordering::Relaxed);
        self.max_occupancy
            .fetch_max(report.occupancy, Ordering::Relaxed);
        if report.truncated() {
            self.truncated_cycles.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn fault(&self, err: FifoError) {
        *self.last_error.lock() = Some(err);
        // A stop that raced with the failure keeps the state Idle.
        self.transition(AcquisitionState::Running, AcquisitionState::Faulted);
    }
}

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Value read from the occupancy register
    pub occupancy: u32,
    /// Words actually drained into the ring
    pub drained: u32,
}

impl CycleReport {
    /// Whether the drain cap left reported words in the FIFO.
    pub fn truncated(&self) -> bool {
        self.drained < self.occupancy
    }
}

/// Run one occupancy-read-then-drain cycle.
///
/// The occupancy register is read before the ring lock is taken; the whole
/// drain then runs as one critical section. `max_drain` of 0 means no cap.
///
/// On a data read failure, words drained earlier in the cycle remain in the
/// ring and the error is returned.
pub fn poll_cycle(
    backend: &dyn RegisterBackend,
    ring: &Mutex<SampleRing>,
    registers: &FifoRegisters,
    max_drain: u32,
) -> Result<CycleReport> {
    let occupancy = backend.read32(registers.occupancy())?;
    let target = if max_drain == 0 {
        occupancy
    } else {
        occupancy.min(max_drain)
    };

    let data = registers.data();
    let mut ring = ring.lock();
    for _ in 0..target {
        let sample = backend.read32(data)?;
        ring.write(sample);
    }

    Ok(CycleReport {
        occupancy,
        drained: target,
    })
}

/// Everything the loop thread needs; moved into the thread on spawn.
pub(crate) struct AcquisitionLoop {
    pub backend: Arc<dyn RegisterBackend>,
    pub ring: Arc<Mutex<SampleRing>>,
    pub status: Arc<AcquisitionStatus>,
    pub registers: FifoRegisters,
    pub period: Duration,
    pub max_drain: u32,
    pub running: Arc<AtomicBool>,
}

impl AcquisitionLoop {
    /// Poll until the run flag clears or a register access fails.
    pub fn run(self) {
        info!(
            backend = self.backend.name(),
            base = format_args!("{:#x}", self.registers.base),
            period_us = self.period.as_micros() as u64,
            "Acquisition loop started"
        );

        while self.running.load(Ordering::Acquire) {
            match poll_cycle(
                self.backend.as_ref(),
                &self.ring,
                &self.registers,
                self.max_drain,
            ) {
                Ok(report) => {
                    self.status.record(&report);
                    if report.truncated() {
                        warn!(
                            occupancy = report.occupancy,
                            drained = report.drained,
                            "Drain capped; remaining words deferred to next cycle"
                        );
                    } else {
                        trace!(drained = report.drained, "Poll cycle complete");
                    }
                }
                Err(err) => {
                    error!(error = %err, "Acquisition loop stopped on register failure");
                    self.running.store(false, Ordering::Release);
                    self.status.fault(err);
                    return;
                }
            }

            sleep_while_running(self.period, &self.running);
        }

        debug!("Acquisition loop exiting");
    }
}

/// Sleep for `period`, returning early once `running` is cleared.
fn sleep_while_running(period: Duration, running: &AtomicBool) {
    if period.is_zero() {
        thread::yield_now();
        return;
    }

    let deadline = Instant::now() + period;
    while running.load(Ordering::Acquire) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::park_timeout(deadline - now);
    }
}
