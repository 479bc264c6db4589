//! # Vote Telemetry
//!
//! Observability for the channel vote bot.
//!
//! ## Components
//!
//! - **Logs**: `tracing` with an `EnvFilter` and pretty or JSON output
//! - **Metrics**: Prometheus counters, gauges and histograms in a global registry
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vote_telemetry::{TelemetryConfig, init_telemetry};
//!
//! fn main() {
//!     init_telemetry(TelemetryConfig::from_env()).expect("Failed to init telemetry");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `VOTE_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `VOTE_JSON_LOGS` | `false` | JSON log lines |
//! | `VOTE_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `VOTE_SERVICE_NAME` | `channel-vote-bot` | Service name |

mod config;
pub mod logging;
pub mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    encode_metrics, register_metrics, BUTTON_REFRESH_FAILURES, COUNT_MISMATCHES,
    LEDGER_RECORDS, PARTICIPATIONS, SWEEP_DEFERRED_VOTERS, SWEEP_DURATION, SWEEP_RETRACTIONS,
    SWEEP_RUNS, VOTE_CASTS,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing: {0}")]
    TracingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Initialize logging and register metrics.
pub fn init_telemetry(config: TelemetryConfig) -> Result<(), TelemetryError> {
    register_metrics()?;
    tracing_setup::init_tracing(&config)
}
