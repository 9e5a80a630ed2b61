//! Tracing subscriber setup.
//!
//! The library only emits `tracing` events; binaries call [`init`] (or
//! [`init_from_config`]) once to install a formatter. `RUST_LOG` takes
//! precedence over the configured level.
//!
//! # Example
//! ```no_run
//! use fifo_reader::logging::{self, LogFormat, TracingConfig};
//! use tracing::Level;
//!
//! logging::init(TracingConfig::new(Level::DEBUG).with_format(LogFormat::Compact))?;
//! tracing::info!("Reader starting");
//! # Ok::<(), fifo_reader::FifoError>(())
//! ```

use crate::config::LoggingConfig;
use crate::error::{FifoError, Result};
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Output format for tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Pretty-printed format with colors (for development)
    #[default]
    Pretty,
    /// Compact format without colors (for production)
    Compact,
    /// JSON format for structured logging (for log aggregation)
    Json,
}

/// Tracing configuration options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level used when `RUST_LOG` is not set
    pub level: Level,
    /// Output format
    pub format: LogFormat,
    /// Whether to include thread names (the loop thread is `fifo-acq`)
    pub with_thread_names: bool,
    /// Whether to enable ANSI colors (Pretty format only)
    pub with_ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            with_thread_names: true,
            with_ansi: true,
        }
    }
}

impl TracingConfig {
    /// Create tracing config with custom level
    pub fn new(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Create tracing config from the `[logging]` section
    pub fn from_logging_config(config: &LoggingConfig) -> Result<Self> {
        Ok(Self {
            level: parse_log_level(&config.level)?,
            format: config.format,
            ..Default::default()
        })
    }

    /// Set output format
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Enable or disable ANSI colors
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.with_ansi = enabled;
        self
    }
}

/// Initialize tracing from the `[logging]` configuration section.
pub fn init_from_config(config: &LoggingConfig) -> Result<()> {
    init(TracingConfig::from_logging_config(config)?)
}

/// Install the global subscriber.
///
/// Idempotent: if a global subscriber is already set this returns `Ok(())`.
pub fn init(config: TracingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_lowercase()));

    let fmt_layer = match config.format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_thread_names(config.with_thread_names)
            .with_ansi(config.with_ansi)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_thread_names(config.with_thread_names)
            .with_ansi(false)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_thread_names(config.with_thread_names)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(env_filter))
        .try_init()
        .or_else(|e| {
            // Already initialized is expected in tests and embedding binaries
            if e.to_string().contains("a global default trace dispatcher has already been set") {
                Ok(())
            } else {
                Err(FifoError::Config(format!("Failed to initialize tracing: {}", e)))
            }
        })
}

/// Parse log level string into tracing Level
fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(FifoError::Config(format!(
            "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
            level
        ))),
    }
}
