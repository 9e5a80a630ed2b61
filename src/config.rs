//! Configuration loading using Figment.
//!
//! Configuration is layered from:
//! 1. Built-in defaults
//! 2. A TOML file (default `config/fifo_reader.toml`)
//! 3. Environment variables prefixed with `FIFO_READER_`, nested with `__`
//!
//! # Example
//! ```no_run
//! use fifo_reader::config::ReaderConfig;
//!
//! // FIFO_READER_FIFO__PERIOD_US=500 overrides fifo.period_us
//! let config = ReaderConfig::load_from("config/fifo_reader.toml")?;
//! config.validate()?;
//! println!("Polling {:#x} every {} us", config.fifo.address, config.fifo.period_us);
//! # Ok::<(), fifo_reader::FifoError>(())
//! ```

use crate::error::{FifoError, Result};
use crate::logging::LogFormat;
use crate::registers::OccupancyRegister;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/fifo_reader.toml";

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "FIFO_READER_";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// FIFO and acquisition settings
    #[serde(default)]
    pub fifo: FifoConfig,
    /// Register backend settings
    #[serde(default)]
    pub backend: BackendConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// FIFO and acquisition settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FifoConfig {
    /// FIFO base address (0 = configure later)
    #[serde(default)]
    pub address: usize,
    /// Samples retained in the window
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Time between poll cycles in microseconds
    #[serde(default = "default_period_us")]
    pub period_us: u32,
    /// Register read to obtain the drain target
    #[serde(default)]
    pub occupancy_register: OccupancyRegister,
    /// Reset the receive FIFO before each start
    #[serde(default)]
    pub reset_on_start: bool,
    /// Upper bound on words drained per cycle (0 = unbounded)
    #[serde(default)]
    pub max_drain_per_cycle: u32,
}

/// Register backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Device to map registers from
    #[serde(default = "default_device")]
    pub device: PathBuf,
    /// Bytes mapped starting at the FIFO base address
    #[serde(default = "default_window_len")]
    pub window_len: usize,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

// Default value functions
fn default_capacity() -> usize {
    4096
}

fn default_period_us() -> u32 {
    1000
}

fn default_device() -> PathBuf {
    PathBuf::from("/dev/mem")
}

fn default_window_len() -> usize {
    0x1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for FifoConfig {
    fn default() -> Self {
        Self {
            address: 0,
            capacity: default_capacity(),
            period_us: default_period_us(),
            occupancy_register: OccupancyRegister::default(),
            reset_on_start: false,
            max_drain_per_cycle: 0,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            window_len: default_window_len(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl ReaderConfig {
    /// Load from [`DEFAULT_CONFIG_PATH`] and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file and the environment.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::figment(path).extract().map_err(FifoError::from)
    }

    /// Provider stack used by [`load_from`](Self::load_from).
    pub fn figment<P: AsRef<Path>>(path: P) -> Figment {
        Figment::from(Serialized::defaults(ReaderConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(FifoError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        if self.fifo.capacity == 0 {
            return Err(FifoError::Config(
                "fifo.capacity must be at least 1".to_string(),
            ));
        }

        if self.backend.window_len == 0 {
            return Err(FifoError::Config(
                "backend.window_len must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}
