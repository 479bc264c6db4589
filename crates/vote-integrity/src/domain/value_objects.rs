//! # Value Objects
//!
//! Identifiers shared by the ledger, the registry and the platform adapters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use crate::error::{VoteError, VoteResult};

/// Telegram user identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Public channel handle, always stored with a leading `@`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(String);

impl ChannelId {
    /// Normalize a handle given with or without the leading `@`.
    pub fn new(handle: impl AsRef<str>) -> VoteResult<Self> {
        let trimmed = handle.as_ref().trim();
        let name = trimmed.strip_prefix('@').unwrap_or(trimmed);

        if name.is_empty() {
            return Err(VoteError::invalid_identifier("empty channel handle"));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(VoteError::invalid_identifier(format!(
                "channel handle contains invalid characters: {trimmed}"
            )));
        }

        Ok(Self(format!("@{name}")))
    }

    /// Handle including the `@`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Handle without the `@`.
    pub fn name(&self) -> &str {
        &self.0[1..]
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ChannelId {
    type Err = VoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Unique participant post identifier: `<participant_user_id>_<unix_micros>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PostId {
    participant: UserId,
    stamp_micros: u64,
}

impl PostId {
    pub fn compose(participant: UserId, stamp_micros: u64) -> Self {
        Self {
            participant,
            stamp_micros,
        }
    }

    /// Parse the textual form. Both halves must be decimal digits.
    pub fn parse(raw: &str) -> VoteResult<Self> {
        let (user, stamp) = raw
            .split_once('_')
            .ok_or_else(|| VoteError::invalid_identifier(format!("malformed post id: {raw}")))?;

        let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !digits(user) || !digits(stamp) {
            return Err(VoteError::invalid_identifier(format!(
                "malformed post id: {raw}"
            )));
        }

        let participant = user
            .parse::<u64>()
            .map_err(|e| VoteError::invalid_identifier(format!("post id user part: {e}")))?;
        let stamp_micros = stamp
            .parse::<u64>()
            .map_err(|e| VoteError::invalid_identifier(format!("post id stamp part: {e}")))?;

        Ok(Self::compose(UserId(participant), stamp_micros))
    }

    pub fn participant(&self) -> UserId {
        self.participant
    }

    pub fn stamp_micros(&self) -> u64 {
        self.stamp_micros
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.participant, self.stamp_micros)
    }
}

impl FromStr for PostId {
    type Err = VoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Platform message id of the channel message that carries a vote button.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef(pub i32);

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Post id source with strictly increasing stamps.
///
/// Two posts created in the same microsecond get consecutive stamps, so
/// ids never collide within one generator.
#[derive(Debug, Default)]
pub struct PostIdGenerator {
    last_stamp: AtomicU64,
}

impl PostIdGenerator {
    pub const fn new() -> Self {
        Self {
            last_stamp: AtomicU64::new(0),
        }
    }

    /// Next id for `participant` using the wall clock.
    pub fn next(&self, participant: UserId) -> PostId {
        let now = u64::try_from(Utc::now().timestamp_micros()).unwrap_or(0);
        self.next_at(participant, now)
    }

    /// Next id given an explicit clock reading.
    pub fn next_at(&self, participant: UserId, now_micros: u64) -> PostId {
        let previous = self
            .last_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now_micros.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);

        PostId::compose(participant, now_micros.max(previous.saturating_add(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_channel_id_normalizes_at_prefix() {
        let a = ChannelId::new("my_channel").unwrap();
        let b = ChannelId::new("@my_channel").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "@my_channel");
        assert_eq!(a.name(), "my_channel");
    }

    #[test]
    fn test_channel_id_rejects_empty_and_garbage() {
        assert!(ChannelId::new("").is_err());
        assert!(ChannelId::new("@").is_err());
        assert!(ChannelId::new("bad:name").is_err());
        assert!(ChannelId::new("two words").is_err());
    }

    #[test]
    fn test_post_id_display_and_parse() {
        let id = PostId::compose(UserId(123), 1_700_000_000_123_456);
        assert_eq!(id.to_string(), "123_1700000000123456");
        assert_eq!(PostId::parse("123_1700000000123456").unwrap(), id);
        assert_eq!(id.participant(), UserId(123));
    }

    #[test]
    fn test_post_id_rejects_legacy_and_malformed() {
        assert!(PostId::parse("123").is_err());
        assert!(PostId::parse("123_").is_err());
        assert!(PostId::parse("_456").is_err());
        assert!(PostId::parse("12a_456").is_err());
        assert!(PostId::parse("1_2_3").is_err());
    }

    #[test]
    fn test_generator_same_microsecond_is_unique() {
        let gen = PostIdGenerator::new();
        let a = gen.next_at(UserId(5), 1_000);
        let b = gen.next_at(UserId(5), 1_000);
        let c = gen.next_at(UserId(5), 999);
        assert_ne!(a, b);
        assert_eq!(b.stamp_micros(), 1_001);
        assert_eq!(c.stamp_micros(), 1_002);
    }

    #[test]
    fn test_generator_unique_across_threads() {
        let gen = Arc::new(PostIdGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gen = Arc::clone(&gen);
                std::thread::spawn(move || {
                    (0..500).map(|_| gen.next(UserId(9))).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate post id generated");
            }
        }
        assert_eq!(seen.len(), 4_000);
    }
}
