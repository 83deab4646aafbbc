//! Command-line and environment configuration.

use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::logging::LogFormat;
use crate::realtime::{BackpressurePolicy, RelaySettings};

/// calcrelay - computes arithmetic requests and broadcasts every result to all clients.
#[derive(Debug, Clone, Parser)]
#[command(name = "calcrelay", version)]
pub struct Config {
    /// Address to listen on
    #[arg(
        long = "addr",
        env = "CALCRELAY_ADDR",
        default_value = "localhost:8080"
    )]
    pub addr: String,

    /// Maximum number of results waiting to be broadcast
    #[arg(
        long = "queue-capacity",
        env = "CALCRELAY_QUEUE_CAPACITY",
        default_value = "256",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub queue_capacity: u32,

    /// What producers do when the queue is full (block, drop-oldest, drop-newest)
    #[arg(
        long = "backpressure",
        env = "CALCRELAY_BACKPRESSURE",
        default_value = "block"
    )]
    pub backpressure: BackpressurePolicy,

    /// Upper bound on one broadcast write to one client, in milliseconds
    #[arg(
        long = "write-timeout-ms",
        env = "CALCRELAY_WRITE_TIMEOUT_MS",
        default_value = "10000",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub write_timeout_ms: u64,

    /// Close clients silent for this many seconds (0 = never)
    #[arg(
        long = "idle-timeout-secs",
        env = "CALCRELAY_IDLE_TIMEOUT_SECS",
        default_value = "0"
    )]
    pub idle_timeout_secs: u64,

    /// Increase verbosity (can be repeated: -v, -vv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Log output format
    #[arg(
        long = "log-format",
        env = "CALCRELAY_LOG_FORMAT",
        default_value = "text"
    )]
    pub log_format: LogFormat,
}

impl Config {
    /// The relay tunables described by this configuration.
    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            queue_capacity: self.queue_capacity as usize,
            backpressure: self.backpressure,
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            idle_timeout: (self.idle_timeout_secs > 0)
                .then(|| Duration::from_secs(self.idle_timeout_secs)),
        }
    }
}
