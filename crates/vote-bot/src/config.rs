//! # Bot Configuration
//!
//! Runtime configuration loaded from environment variables.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `BOT_TOKEN` | required | Bot API token |
//! | `REQUIRED_CHANNELS` | support + update channel | Comma-separated channels every voter must join |
//! | `SUPPORT_CHANNEL` / `UPDATE_CHANNEL` | unset | Used when `REQUIRED_CHANNELS` is unset |
//! | `SUBSCRIPTION_CHECK_INTERVAL` | `5` | Minutes between reconciliation sweeps |
//! | `MAINTENANCE_INTERVAL_HOURS` | `24` | Hours between maintenance snapshots |
//! | `LOG_CHANNEL_ID` | unset | Chat id of the operational log channel |
//! | `VOTE_DATA_DIR` | `./data/votes` | RocksDB directory (`rocksdb` feature) |
//! | `VOTE_BUTTON_EMOJI` | `⚡` | Emoji in front of the vote button label |
//! | `METRICS_ADDR` | unset | Listen address of the Prometheus `/metrics` endpoint |

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use vote_integrity::domain::DEFAULT_BUTTON_EMOJI;
use vote_integrity::{ChannelId, VoteConfig};

/// Upper bound for both timers; the scheduler adds intervals to `Instant`s.
const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("BOT_TOKEN is not set")]
    MissingToken,

    #[error("{var} must be a number, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must be greater than zero")]
    ZeroInterval { var: &'static str },

    #[error("{var} is longer than a year")]
    IntervalTooLong { var: &'static str },

    #[error("{var} must be a socket address like 0.0.0.0:9100, got {value:?}")]
    InvalidAddress { var: &'static str, value: String },

    #[error("invalid channel {value:?} in {var}: {reason}")]
    InvalidChannel {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("VOTE_BUTTON_EMOJI must not be empty")]
    EmptyEmoji,
}

/// Complete bot configuration.
#[derive(Clone, Debug)]
pub struct BotConfig {
    pub bot_token: String,
    pub required_channels: Vec<ChannelId>,
    pub sweep_interval: Duration,
    pub maintenance_interval: Duration,
    /// Chat id of the operational log channel, if any.
    pub log_channel_id: Option<i64>,
    pub data_dir: PathBuf,
    pub button_emoji: String,
    /// Where `/metrics` is served; disabled when unset.
    pub metrics_addr: Option<SocketAddr>,
}

impl BotConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bot_token = get("BOT_TOKEN").ok_or(ConfigError::MissingToken)?;

        let required_channels = match get("REQUIRED_CHANNELS") {
            Some(list) => parse_channels("REQUIRED_CHANNELS", &list)?,
            None => {
                let mut channels = Vec::new();
                for var in ["SUPPORT_CHANNEL", "UPDATE_CHANNEL"] {
                    if let Some(value) = get(var) {
                        channels.extend(parse_channels(var, &value)?);
                    }
                }
                channels
            }
        };

        let sweep_interval = parse_interval("SUBSCRIPTION_CHECK_INTERVAL", get, 5, 60)?;
        let maintenance_interval =
            parse_interval("MAINTENANCE_INTERVAL_HOURS", get, 24, 60 * 60)?;
        let log_channel_id = match get("LOG_CHANNEL_ID") {
            Some(value) => Some(value.trim().parse::<i64>().map_err(|_| {
                ConfigError::InvalidNumber {
                    var: "LOG_CHANNEL_ID",
                    value,
                }
            })?),
            None => None,
        };
        let metrics_addr = match get("METRICS_ADDR") {
            Some(value) => Some(value.trim().parse::<SocketAddr>().map_err(|_| {
                ConfigError::InvalidAddress {
                    var: "METRICS_ADDR",
                    value,
                }
            })?),
            None => None,
        };

        let config = Self {
            bot_token,
            required_channels,
            sweep_interval,
            maintenance_interval,
            log_channel_id,
            data_dir: get("VOTE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/votes")),
            button_emoji: get("VOTE_BUTTON_EMOJI")
                .unwrap_or_else(|| DEFAULT_BUTTON_EMOJI.to_string()),
            metrics_addr,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the runtime cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot_token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::ZeroInterval {
                var: "SUBSCRIPTION_CHECK_INTERVAL",
            });
        }
        if self.maintenance_interval.is_zero() {
            return Err(ConfigError::ZeroInterval {
                var: "MAINTENANCE_INTERVAL_HOURS",
            });
        }
        if self.button_emoji.trim().is_empty() {
            return Err(ConfigError::EmptyEmoji);
        }
        Ok(())
    }

    /// Core configuration derived from this one.
    pub fn vote_config(&self) -> VoteConfig {
        VoteConfig {
            required_channels: self.required_channels.clone(),
            sweep_interval: self.sweep_interval,
            maintenance_interval: self.maintenance_interval,
            button_emoji: self.button_emoji.clone(),
            ..VoteConfig::default()
        }
    }
}

fn parse_channels(var: &'static str, list: &str) -> Result<Vec<ChannelId>, ConfigError> {
    let mut channels: Vec<ChannelId> = Vec::new();
    for raw in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let channel = ChannelId::from_str(raw).map_err(|e| ConfigError::InvalidChannel {
            var,
            value: raw.to_string(),
            reason: e.to_string(),
        })?;
        if !channels.contains(&channel) {
            channels.push(channel);
        }
    }
    Ok(channels)
}

fn parse_number(
    var: &'static str,
    get: impl Fn(&str) -> Option<String>,
    default: u64,
) -> Result<u64, ConfigError> {
    match get(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
        None => Ok(default),
    }
}

/// Interval variable given in whole units of `unit_secs` seconds.
fn parse_interval(
    var: &'static str,
    get: impl Fn(&str) -> Option<String>,
    default: u64,
    unit_secs: u64,
) -> Result<Duration, ConfigError> {
    let units = parse_number(var, &get, default)?;
    let interval = units
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or(ConfigError::IntervalTooLong { var })?;
    if interval > MAX_INTERVAL {
        return Err(ConfigError::IntervalTooLong { var });
    }
    Ok(interval)
}
