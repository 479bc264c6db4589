//! # Vote Integrity Configuration
//!
//! Explicit configuration handed to the processor and the sweeper at
//! construction time.

use std::time::Duration;

use crate::domain::{ChannelId, DEFAULT_BUTTON_EMOJI};
use crate::error::{VoteError, VoteResult};

/// Default reconciliation interval (5 minutes).
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default maintenance interval (24 hours).
pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default age below which a vote may still have its increment in flight.
pub const DEFAULT_SETTLE_WINDOW: Duration = Duration::from_secs(60);

/// Vote integrity configuration.
#[derive(Clone, Debug)]
pub struct VoteConfig {
    /// Channels every voter must be subscribed to, in addition to the
    /// channel the vote is cast in.
    pub required_channels: Vec<ChannelId>,

    /// Period between reconciliation sweeps.
    pub sweep_interval: Duration,

    /// Period between maintenance snapshots.
    pub maintenance_interval: Duration,

    /// Emoji shown in front of the vote button label.
    pub button_emoji: String,

    /// A sweep whose decrement clamps at zero keeps records younger than
    /// this: the vote's own increment has not landed yet.
    pub settle_window: Duration,
}

impl Default for VoteConfig {
    fn default() -> Self {
        Self {
            required_channels: Vec::new(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            maintenance_interval: DEFAULT_MAINTENANCE_INTERVAL,
            button_emoji: DEFAULT_BUTTON_EMOJI.to_string(),
            settle_window: DEFAULT_SETTLE_WINDOW,
        }
    }
}

impl VoteConfig {
    /// Create a config for testing (short intervals).
    pub fn for_testing() -> Self {
        Self {
            required_channels: Vec::new(),
            sweep_interval: Duration::from_millis(50),
            maintenance_interval: Duration::from_millis(200),
            button_emoji: DEFAULT_BUTTON_EMOJI.to_string(),
            settle_window: DEFAULT_SETTLE_WINDOW,
        }
    }

    pub fn with_required_channels(mut self, channels: Vec<ChannelId>) -> Self {
        self.required_channels = channels;
        self
    }

    /// Required-subscription set for a vote in `channel`: the channel
    /// itself first, then the global channels, without duplicates.
    pub fn required_channels_for(&self, channel: &ChannelId) -> Vec<ChannelId> {
        let mut required = Vec::with_capacity(self.required_channels.len() + 1);
        required.push(channel.clone());
        for extra in &self.required_channels {
            if !required.contains(extra) {
                required.push(extra.clone());
            }
        }
        required
    }

    pub fn validate(&self) -> VoteResult<()> {
        if self.sweep_interval.is_zero() {
            return Err(VoteError::InvalidConfig {
                reason: "sweep interval must be greater than zero".to_string(),
            });
        }
        if self.maintenance_interval.is_zero() {
            return Err(VoteError::InvalidConfig {
                reason: "maintenance interval must be greater than zero".to_string(),
            });
        }
        if self.button_emoji.trim().is_empty() {
            return Err(VoteError::InvalidConfig {
                reason: "button emoji must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
