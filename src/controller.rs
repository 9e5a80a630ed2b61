//! `FifoReader`: configure, start, stop and read out a polled FIFO.
//!
//! # Locking
//!
//! - The ring (storage, cursor, counter) sits behind one `parking_lot::Mutex`.
//!   The loop holds it for a whole drain; readers hold it for a whole
//!   linearization. Every snapshot therefore reflects one cursor state.
//! - Controller bookkeeping (address, period, loop handle) sits behind a
//!   separate mutex that the loop thread never takes.
//!
//! # Single writer
//!
//! At most one loop thread exists per reader. `start` refuses to run while a
//! loop is active, and joins a previous, already-stopped loop before spawning
//! a new one, so a slow-to-exit loop can never overlap its successor. Each
//! loop gets its own run flag.
//!
//! # Readers
//!
//! No output buffer is shared between readers: [`FifoReader::get_data`]
//! allocates and [`FifoReader::read_into`] fills caller storage, so any number
//! of threads may read concurrently.

use crate::acquisition::{AcquisitionLoop, AcquisitionState, AcquisitionStats, AcquisitionStatus};
use crate::backend::RegisterBackend;
use crate::config::FifoConfig;
use crate::error::{FifoError, Result};
use crate::linearize::{Snapshot, SnapshotMeta};
use crate::registers::{FifoRegisters, OccupancyRegister, MAX_OFFSET, RESET_KEY};
use crate::ring_buffer::SampleRing;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

/// Name given to the acquisition thread.
pub const THREAD_NAME: &str = "fifo-acq";

/// Options fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReaderOptions {
    /// Register read to obtain the drain target
    pub occupancy: OccupancyRegister,
    /// Write the reset key to RDFR before each start
    pub reset_on_start: bool,
    /// Upper bound on words drained per cycle (0 = unbounded)
    pub max_drain_per_cycle: u32,
}

impl From<&FifoConfig> for ReaderOptions {
    fn from(config: &FifoConfig) -> Self {
        Self {
            occupancy: config.occupancy_register,
            reset_on_start: config.reset_on_start,
            max_drain_per_cycle: config.max_drain_per_cycle,
        }
    }
}

/// Handle to a spawned loop.
struct Worker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Worker {
    fn signal_stop(&self) {
        self.running.store(false, Ordering::Release);
        self.handle.thread().unpark();
    }

    fn join(self) {
        if let Err(e) = self.handle.join() {
            error!("Acquisition thread panicked: {:?}", e);
        }
    }
}

#[derive(Default)]
struct Control {
    address: Option<usize>,
    period: Duration,
    worker: Option<Worker>,
}

/// Polled FIFO with a bounded, oldest-to-newest sample window.
///
/// # Example
///
/// ```
/// use fifo_reader::backend::MockFifo;
/// use fifo_reader::FifoReader;
/// use std::sync::Arc;
///
/// let fifo = Arc::new(MockFifo::new(0x4000_0000));
/// fifo.push(1..=11);
///
/// let reader = FifoReader::new(fifo, 8)?;
/// reader.configure(0x4000_0000)?;
/// reader.start(100)?;
/// while reader.sample_count() < 11 {
///     std::thread::sleep(std::time::Duration::from_millis(1));
/// }
/// reader.stop_and_wait();
///
/// assert_eq!(reader.get_data(), vec![4, 5, 6, 7, 8, 9, 10, 11]);
/// # Ok::<(), fifo_reader::FifoError>(())
/// ```
pub struct FifoReader {
    backend: Arc<dyn RegisterBackend>,
    ring: Arc<Mutex<SampleRing>>,
    status: Arc<AcquisitionStatus>,
    options: ReaderOptions,
    control: Mutex<Control>,
}

impl FifoReader {
    /// Reader with default options and a `capacity`-sample window.
    pub fn new(backend: Arc<dyn RegisterBackend>, capacity: usize) -> Result<Self> {
        Self::with_options(backend, capacity, ReaderOptions::default())
    }

    /// Reader with explicit options.
    pub fn with_options(
        backend: Arc<dyn RegisterBackend>,
        capacity: usize,
        options: ReaderOptions,
    ) -> Result<Self> {
        let ring = SampleRing::new(capacity)?;
        debug!(backend = backend.name(), capacity, "Created FIFO reader");

        Ok(Self {
            backend,
            ring: Arc::new(Mutex::new(ring)),
            status: Arc::new(AcquisitionStatus::default()),
            options,
            control: Mutex::new(Control::default()),
        })
    }

    /// Reader built from the `[fifo]` configuration section.
    ///
    /// A non-zero `address` is applied with [`configure`](Self::configure);
    /// `period_us` is used by the caller when starting.
    pub fn from_config(backend: Arc<dyn RegisterBackend>, config: &FifoConfig) -> Result<Self> {
        let reader = Self::with_options(backend, config.capacity, ReaderOptions::from(config))?;
        if config.address != 0 {
            reader.configure(config.address)?;
        }
        Ok(reader)
    }

    /// Set the FIFO base address.
    ///
    /// Fails with [`FifoError::AlreadyRunning`] while a loop is active and with
    /// [`FifoError::InvalidAddress`] when the register block cannot live at
    /// `address`.
    pub fn configure(&self, address: usize) -> Result<()> {
        let mut control = self.control.lock();
        if self.loop_active(&control) {
            return Err(FifoError::AlreadyRunning);
        }

        self.validate_address(address)?;
        control.address = Some(address);
        info!(address = format_args!("{:#x}", address), "FIFO address configured");
        Ok(())
    }

    fn validate_address(&self, address: usize) -> Result<()> {
        if address == 0 {
            return Err(FifoError::invalid_address(address, "address is null"));
        }
        if address % 4 != 0 {
            return Err(FifoError::invalid_address(address, "not 4-byte aligned"));
        }
        if address.checked_add(MAX_OFFSET + 4).is_none() {
            return Err(FifoError::invalid_address(
                address,
                "register block overflows the address space",
            ));
        }

        let registers = FifoRegisters::new(address, self.options.occupancy);
        if let Some(outside) = registers
            .used()
            .into_iter()
            .find(|reg| !self.backend.contains(*reg))
        {
            return Err(FifoError::invalid_address(
                address,
                format!(
                    "register {:#x} is outside the {} backend window",
                    outside,
                    self.backend.name()
                ),
            ));
        }
        Ok(())
    }

    /// Start polling every `period_us` microseconds.
    ///
    /// Fails with [`FifoError::AlreadyRunning`] if a loop is active and with
    /// [`FifoError::InvalidAddress`] if no address was configured. A fault
    /// from a previous run is cleared.
    pub fn start(&self, period_us: u32) -> Result<()> {
        let mut control = self.control.lock();
        if self.loop_active(&control) {
            return Err(FifoError::AlreadyRunning);
        }

        let address = control
            .address
            .ok_or_else(|| FifoError::invalid_address(0, "no FIFO address configured"))?;

        // A stopped loop may still be finishing its last drain.
        if let Some(previous) = control.worker.take() {
            previous.signal_stop();
            previous.join();
        }

        let registers = FifoRegisters::new(address, self.options.occupancy);
        if self.options.reset_on_start {
            self.backend.write32(registers.reset(), RESET_KEY)?;
            debug!("Receive FIFO reset");
        }

        let period = Duration::from_micros(u64::from(period_us));
        let running = Arc::new(AtomicBool::new(true));
        let acquisition = AcquisitionLoop {
            backend: Arc::clone(&self.backend),
            ring: Arc::clone(&self.ring),
            status: Arc::clone(&self.status),
            registers,
            period,
            max_drain: self.options.max_drain_per_cycle,
            running: Arc::clone(&running),
        };

        self.status.clear_error();
        self.status.set_state(AcquisitionState::Running);

        let handle = match thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || acquisition.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                self.status.set_state(AcquisitionState::Idle);
                return Err(e.into());
            }
        };

        control.period = period;
        control.worker = Some(Worker { running, handle });
        info!(
            address = format_args!("{:#x}", address),
            period_us, "Acquisition started"
        );
        Ok(())
    }

    /// Ask the loop to stop and return immediately.
    ///
    /// The loop finishes its current drain and exits within one drain plus one
    /// period. Calling `stop` when idle does nothing.
    pub fn stop(&self) {
        let control = self.control.lock();
        if let Some(worker) = &control.worker {
            worker.signal_stop();
        }
        if self
            .status
            .transition(AcquisitionState::Running, AcquisitionState::Idle)
        {
            info!("Acquisition stop requested");
        }
    }

    /// Stop and wait for the loop thread to exit.
    ///
    /// After this returns the ring no longer changes until the next `start`.
    pub fn stop_and_wait(&self) {
        self.stop();
        let worker = self.control.lock().worker.take();
        if let Some(worker) = worker {
            worker.join();
            debug!("Acquisition thread joined");
        }
    }

    /// Current window, oldest first (`capacity()` values).
    pub fn get_data(&self) -> Vec<u32> {
        self.ring.lock().to_vec()
    }

    /// Fill `out` with the current window, oldest first.
    ///
    /// `out` must be `capacity()` long. Returns the counter and cursor the
    /// copy reflects.
    pub fn read_into(&self, out: &mut [u32]) -> Result<SnapshotMeta> {
        let ring = self.ring.lock();
        ring.linearize_into(out)?;
        Ok(ring.meta())
    }

    /// Current window with its counter and cursor.
    pub fn snapshot(&self) -> Snapshot {
        self.ring.lock().snapshot()
    }

    /// Zero the window, cursor and counter.
    pub fn clear(&self) {
        self.ring.lock().clear();
    }

    /// Current loop state.
    pub fn state(&self) -> AcquisitionState {
        self.status.state()
    }

    /// Whether a loop is polling.
    pub fn is_running(&self) -> bool {
        self.state() == AcquisitionState::Running
    }

    /// Failure that ended the most recent loop, if any.
    pub fn last_error(&self) -> Option<FifoError> {
        self.status.last_error()
    }

    /// Loop counters.
    pub fn stats(&self) -> AcquisitionStats {
        self.status.stats()
    }

    /// Samples written into the window since creation or the last `clear`.
    pub fn sample_count(&self) -> u64 {
        self.ring.lock().sample_count()
    }

    /// Window size in samples.
    pub fn capacity(&self) -> usize {
        self.ring.lock().capacity()
    }

    /// Configured FIFO base address.
    pub fn address(&self) -> Option<usize> {
        self.control.lock().address
    }

    /// Period of the current or most recent run.
    pub fn period(&self) -> Duration {
        self.control.lock().period
    }

    /// Construction options.
    pub fn options(&self) -> ReaderOptions {
        self.options
    }

    fn loop_active(&self, control: &Control) -> bool {
        control
            .worker
            .as_ref()
            .is_some_and(|worker| worker.running.load(Ordering::Acquire))
    }
}

impl Drop for FifoReader {
    fn drop(&mut self) {
        self.stop_and_wait();
    }
}

impl std::fmt::Debug for FifoReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FifoReader")
            .field("backend", &self.backend.name())
            .field("state", &self.state())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockFifo;
    use crate::registers::RESET_OFFSET;
    use std::time::Instant;

    const BASE: usize = 0x4000_0000;

    fn reader(capacity: usize) -> (Arc<MockFifo>, FifoReader) {
        let fifo = Arc::new(MockFifo::new(BASE));
        let reader = FifoReader::new(fifo.clone(), capacity).unwrap();
        (fifo, reader)
    }

    fn wait_for(reader: &FifoReader, count: u64) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while reader.sample_count() < count {
            assert!(Instant::now() < deadline, "timed out waiting for samples");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_configure_rejects_bad_addresses() {
        let (_fifo, reader) = reader(4);

        assert!(matches!(reader.configure(0), Err(FifoError::InvalidAddress { .. })));
        assert!(matches!(
            reader.configure(BASE + 2),
            Err(FifoError::InvalidAddress { .. })
        ));
        assert!(matches!(
            reader.configure(usize::MAX - 3),
            Err(FifoError::InvalidAddress { .. })
        ));
        // Mock window does not extend to a different block
        assert!(matches!(
            reader.configure(BASE + 0x1000),
            Err(FifoError::InvalidAddress { .. })
        ));
        assert_eq!(reader.address(), None);

        reader.configure(BASE).unwrap();
        assert_eq!(reader.address(), Some(BASE));
    }

    #[test]
    fn test_start_requires_address() {
        let (_fifo, reader) = reader(4);
        assert!(matches!(reader.start(100), Err(FifoError::InvalidAddress { .. })));
        assert_eq!(reader.state(), AcquisitionState::Idle);
    }

    #[test]
    fn test_start_twice_rejected() {
        let (_fifo, reader) = reader(4);
        reader.configure(BASE).unwrap();
        reader.start(1000).unwrap();

        assert_eq!(reader.start(1000), Err(FifoError::AlreadyRunning));
        assert_eq!(reader.configure(BASE), Err(FifoError::AlreadyRunning));
        assert!(reader.is_running());

        reader.stop_and_wait();
        assert_eq!(reader.state(), AcquisitionState::Idle);
    }

    #[test]
    fn test_restart_after_stop() {
        let (fifo, reader) = reader(8);
        reader.configure(BASE).unwrap();

        fifo.push([1, 2, 3]);
        reader.start(200).unwrap();
        wait_for(&reader, 3);
        reader.stop();

        // Restart immediately, before the first loop has necessarily exited
        fifo.push([4, 5]);
        reader.start(200).unwrap();
        wait_for(&reader, 5);
        reader.stop_and_wait();

        assert_eq!(reader.get_data(), vec![0, 0, 0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (_fifo, reader) = reader(4);
        reader.stop();
        reader.stop_and_wait();

        reader.configure(BASE).unwrap();
        reader.start(100).unwrap();
        reader.stop();
        reader.stop();
        reader.stop_and_wait();
        reader.stop_and_wait();
        assert_eq!(reader.state(), AcquisitionState::Idle);
    }

    #[test]
    fn test_reset_on_start() {
        let fifo = Arc::new(MockFifo::new(BASE));
        fifo.push([1, 2, 3]);
        let reader = FifoReader::with_options(
            fifo.clone(),
            4,
            ReaderOptions {
                reset_on_start: true,
                ..Default::default()
            },
        )
        .unwrap();
        reader.configure(BASE).unwrap();
        reader.start(100).unwrap();
        reader.stop_and_wait();

        assert_eq!(fifo.writes(), vec![(BASE + RESET_OFFSET, RESET_KEY)]);
        assert_eq!(reader.sample_count(), 0);
    }

    #[test]
    fn test_read_into_matches_get_data() {
        let (fifo, reader) = reader(4);
        reader.configure(BASE).unwrap();
        fifo.push(1..=6);
        reader.start(100).unwrap();
        wait_for(&reader, 6);
        reader.stop_and_wait();

        let mut out = vec![0; 4];
        let meta = reader.read_into(&mut out).unwrap();
        assert_eq!(out, reader.get_data());
        assert_eq!(out, vec![3, 4, 5, 6]);
        assert_eq!(meta.sample_count, 6);

        let mut wrong = vec![0; 3];
        assert!(reader.read_into(&mut wrong).is_err());
    }

    #[test]
    fn test_from_config() {
        let fifo = Arc::new(MockFifo::new(BASE));
        let config = FifoConfig {
            address: BASE,
            capacity: 16,
            occupancy_register: OccupancyRegister::Occupancy,
            ..Default::default()
        };
        let reader = FifoReader::from_config(fifo, &config).unwrap();
        assert_eq!(reader.capacity(), 16);
        assert_eq!(reader.address(), Some(BASE));
        assert_eq!(reader.options().occupancy, OccupancyRegister::Occupancy);
    }

    #[test]
    fn test_clear() {
        let (fifo, reader) = reader(4);
        reader.configure(BASE).unwrap();
        fifo.push([7, 8]);
        reader.start(100).unwrap();
        wait_for(&reader, 2);
        reader.stop_and_wait();

        reader.clear();
        assert_eq!(reader.sample_count(), 0);
        assert_eq!(reader.get_data(), vec![0; 4]);
    }
}
