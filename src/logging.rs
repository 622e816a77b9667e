//! Structured logging through the `tracing` ecosystem
//!
//! The library only emits events; binaries install a subscriber with [`init_logging`].

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::Error;

/// Log level
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Every event, including per-iteration decoder events
    Trace,
    /// Construction of encoders, decoders and interleavers
    Debug,
    /// Simulation progress
    #[default]
    Info,
    /// Suspicious configurations
    Warn,
    /// Errors only
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(Error::InvalidArgument(format!("Unknown log level '{s}'"))),
        }
    }
}

/// Installs the global subscriber, writing compact lines to standard error.
///
/// # Parameters
///
/// - `level`: Level used when neither `filter` nor the `RUST_LOG` environment variable is set.
///
/// - `filter`: Optional filter directives (e.g. `"turbo_siso::turbo=trace"`), taking precedence
///   over `RUST_LOG`. Invalid directives fall back to `level`.
///
/// Calls after the first one are silently ignored.
pub fn init_logging(level: LogLevel, filter: Option<&str>) {
    let filter = match filter {
        Some(directives) => {
            EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(level.to_string()))
        }
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.to_string())),
    };
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .try_init();
}
