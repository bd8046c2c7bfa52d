//! Log subscriber setup.
//!
//! Only task-context code logs (consumer, timer driver, CLI); the per-tick
//! producer path stays silent. Events are written to stderr so that stdout
//! carries nothing but collected data. `RUST_LOG` takes precedence over the
//! configured `[application] log_level`.
//!
//! # Example
//! ```no_run
//! use imu_daq::{config::DaqConfig, logging};
//! use tracing::info;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DaqConfig::load()?;
//! logging::init_from_config(&config)?;
//! info!(rate_hz = config.sensor.sample_rate_hz, "acquisition configured");
//! # Ok(())
//! # }
//! ```

use crate::config::DaqConfig;
use crate::error::{AppResult, DaqError};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Event output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Multi-line, coloured when stderr is a terminal
    #[default]
    Pretty,
    /// One line per event, no colour
    Compact,
    /// One JSON object per event
    Json,
}

/// Subscriber settings resolved from [`DaqConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSettings {
    /// Level used when `RUST_LOG` is unset
    pub level: Level,
    /// Output format
    pub format: OutputFormat,
}

impl LogSettings {
    /// Resolve the `[application]` section.
    ///
    /// # Errors
    /// `Configuration` for an unknown level name.
    pub fn from_config(config: &DaqConfig) -> AppResult<Self> {
        Ok(Self {
            level: parse_level(&config.application.log_level)?,
            format: config.application.log_format,
        })
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_str().to_lowercase()))
    }
}

/// Install the global subscriber described by the `[application]` section.
pub fn init_from_config(config: &DaqConfig) -> AppResult<()> {
    init(LogSettings::from_config(config)?)
}

/// Install the global subscriber.
///
/// Returns `Ok(())` without changes when a subscriber is already installed,
/// so tests and embedding applications may call it repeatedly.
pub fn init(settings: LogSettings) -> AppResult<()> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let stderr = fmt::layer().with_writer(std::io::stderr);
    let layer = match settings.format {
        OutputFormat::Pretty => stderr
            .pretty()
            .with_ansi(std::io::stderr().is_terminal())
            .with_filter(settings.filter())
            .boxed(),
        OutputFormat::Compact => stderr
            .compact()
            .with_ansi(false)
            .with_filter(settings.filter())
            .boxed(),
        OutputFormat::Json => stderr.json().with_filter(settings.filter()).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| DaqError::Configuration(format!("cannot install log subscriber: {e}")))
}

fn parse_level(level: &str) -> AppResult<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(DaqError::Configuration(format!(
            "unknown log level '{level}'"
        ))),
    }
}
