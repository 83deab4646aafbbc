//! Structured logging setup.
//!
//! The library only emits `tracing` events; the binary calls [`init`] once at
//! startup to decide where they go and how they look.

use clap::ValueEnum;
use thiserror::Error;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to install log subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Maps the `-v` count to a level: 0=info, 1=debug, 2+=trace.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Installs the global subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence over `verbosity` when set.
///
/// # Errors
///
/// Returns [`LoggingError::Init`] if a global subscriber is already installed.
pub fn init(verbosity: u8, format: LogFormat) -> Result<(), LoggingError> {
    let level = level_for(verbosity);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("calcrelay={level}")));

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(verbosity >= 1)
                    .with_line_number(verbosity >= 1),
            )
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?,
    }

    Ok(())
}
