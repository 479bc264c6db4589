//! # Vote Bot
//!
//! Telegram runtime for subscriber-only channel vote polls.
//!
//! ## Modules
//!
//! - `config/` - Environment configuration and validation
//! - `telegram/` - Bot API adapters for the core's outbound ports
//! - `handlers/` - Update routing: vote callbacks and private-chat commands
//! - `metrics_server/` - Prometheus `/metrics` endpoint (`METRICS_ADDR`)
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (tracing + Prometheus registry)
//! 2. Load and validate `BotConfig`
//! 3. Open the vote tables (in-memory, or RocksDB with the `rocksdb` feature)
//! 4. Start the button refresh worker, the reconciliation sweeper and the
//!    metrics endpoint
//! 5. Dispatch updates until Ctrl-C, then signal shutdown

pub mod config;
pub mod handlers;
pub mod metrics_server;
pub mod telegram;

pub use config::{BotConfig, ConfigError};
pub use handlers::{schema, AppState};
pub use telegram::{TelegramLog, TelegramPlatform};
