//! CLI entry point for fifo-reader
//!
//! Provides commands for:
//! - Running continuous acquisition with a once-per-second summary
//! - Dumping a single acquisition window
//!
//! # Usage
//!
//! Poll a FIFO on the board until Ctrl-C:
//! ```bash
//! fifo-reader run --config config/fifo_reader.toml
//! ```
//!
//! Dump one window from the simulated FIFO as JSON:
//! ```bash
//! fifo-reader dump --mock --format json
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fifo_reader::config::ReaderConfig;
use fifo_reader::{logging, AcquisitionState, DevMemBackend, FifoReader, MockFifo, RegisterBackend};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Base address used for the simulated FIFO when none is configured.
const MOCK_BASE: usize = 0x4000_0000;

/// Words the simulated FIFO produces per poll.
const MOCK_BATCH: u32 = 64;

#[derive(Parser)]
#[command(name = "fifo-reader")]
#[command(about = "Poll a memory-mapped FPGA FIFO into a ring buffer", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// FIFO base address, overrides the configuration (hex with 0x prefix or decimal)
    #[arg(long, global = true, value_parser = parse_address)]
    address: Option<usize>,

    /// Poll period in microseconds, overrides the configuration
    #[arg(long, global = true)]
    period_us: Option<u32>,

    /// Use the simulated FIFO instead of /dev/mem
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll continuously, logging a summary every second
    Run {
        /// Stop after this many seconds (default: until Ctrl-C)
        #[arg(long)]
        duration_secs: Option<u64>,
    },

    /// Acquire for a short window and print the samples
    Dump {
        /// Acquisition window in milliseconds
        #[arg(long, default_value = "1000")]
        window_ms: u64,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: DumpFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DumpFormat {
    Text,
    Json,
}

fn parse_address(value: &str) -> std::result::Result<usize, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(&hex.replace('_', ""), 16),
        None => value.replace('_', "").parse(),
    };
    parsed.map_err(|e| format!("invalid address '{}': {}", value, e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ReaderConfig::load_from(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ReaderConfig::load()?,
    };
    if let Some(address) = cli.address {
        config.fifo.address = address;
    }
    if let Some(period_us) = cli.period_us {
        config.fifo.period_us = period_us;
    }
    if cli.mock && config.fifo.address == 0 {
        config.fifo.address = MOCK_BASE;
    }
    config.validate()?;
    logging::init_from_config(&config.logging)?;

    if config.fifo.address == 0 {
        bail!("No FIFO address configured; pass --address or set fifo.address");
    }

    let backend: Arc<dyn RegisterBackend> = if cli.mock {
        info!("Using simulated FIFO");
        Arc::new(MockFifo::counting(config.fifo.address, MOCK_BATCH))
    } else {
        Arc::new(DevMemBackend::open(
            &config.backend.device,
            config.fifo.address,
            config.backend.window_len,
        )?)
    };

    let reader = FifoReader::from_config(backend, &config.fifo)?;

    match cli.command {
        Commands::Run { duration_secs } => {
            run_continuous(&reader, config.fifo.period_us, duration_secs).await
        }
        Commands::Dump { window_ms, format } => {
            dump_window(&reader, config.fifo.period_us, window_ms, format).await
        }
    }
}

async fn run_continuous(reader: &FifoReader, period_us: u32, duration_secs: Option<u64>) -> Result<()> {
    reader.start(period_us)?;

    let deadline = duration_secs.map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs));
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.tick().await;

    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received");
                break Ok(());
            }
            _ = ticker.tick() => {
                let snapshot = reader.snapshot();
                let stats = reader.stats();
                info!(
                    samples = snapshot.meta.sample_count,
                    newest = ?snapshot.newest(),
                    cycles = stats.cycles,
                    max_occupancy = stats.max_occupancy,
                    "Acquisition status"
                );

                if stats.state == AcquisitionState::Faulted {
                    let err = reader.last_error();
                    warn!(error = ?err, "Acquisition faulted");
                    break Err(anyhow::anyhow!(
                        "acquisition faulted: {}",
                        err.map(|e| e.to_string()).unwrap_or_default()
                    ));
                }
                if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
                    break Ok(());
                }
            }
        }
    };

    reader.stop_and_wait();
    info!(samples = reader.sample_count(), "Acquisition stopped");
    outcome
}

async fn dump_window(reader: &FifoReader, period_us: u32, window_ms: u64, format: DumpFormat) -> Result<()> {
    reader.start(period_us)?;
    tokio::time::sleep(Duration::from_millis(window_ms)).await;
    reader.stop_and_wait();

    if let Some(err) = reader.last_error() {
        warn!(error = %err, "Acquisition faulted during dump window");
    }

    let snapshot = reader.snapshot();
    match format {
        DumpFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        DumpFormat::Text => {
            for sample in snapshot.recent() {
                println!("{:#010x}", sample);
            }
        }
    }
    Ok(())
}
