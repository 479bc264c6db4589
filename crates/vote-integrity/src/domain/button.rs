//! # Vote Button
//!
//! Rendering of the inline vote button and its action reference
//! (callback data): `v:<channel-without-@>:<post_id>`.

use super::value_objects::{ChannelId, PostId};
use crate::error::{VoteError, VoteResult};

/// Prefix that routes a callback to the vote handler.
pub const VOTE_ACTION_PREFIX: &str = "v";

/// Telegram limit for callback data.
pub const MAX_ACTION_LEN: usize = 64;

/// Emoji used when none is configured.
pub const DEFAULT_BUTTON_EMOJI: &str = "⚡";

/// Target of a vote click.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteAction {
    pub channel: ChannelId,
    pub post_id: PostId,
}

impl VoteAction {
    pub fn new(channel: ChannelId, post_id: PostId) -> Self {
        Self { channel, post_id }
    }

    pub fn encode(&self) -> VoteResult<String> {
        let data = format!(
            "{}:{}:{}",
            VOTE_ACTION_PREFIX,
            self.channel.name(),
            self.post_id
        );
        if data.len() > MAX_ACTION_LEN {
            return Err(VoteError::invalid_identifier(format!(
                "vote action exceeds {MAX_ACTION_LEN} bytes: {data}"
            )));
        }
        Ok(data)
    }

    /// Parse callback data. Returns `Ok(None)` when the data is not a vote action.
    pub fn decode(data: &str) -> VoteResult<Option<Self>> {
        let mut parts = data.splitn(3, ':');
        if parts.next() != Some(VOTE_ACTION_PREFIX) {
            return Ok(None);
        }

        let (Some(channel), Some(post)) = (parts.next(), parts.next()) else {
            return Err(VoteError::invalid_identifier(format!(
                "truncated vote action: {data}"
            )));
        };

        Ok(Some(Self {
            channel: ChannelId::new(channel)?,
            post_id: PostId::parse(post)?,
        }))
    }
}

/// Inline button shown under a participant card.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteButton {
    pub label: String,
    pub action: String,
}

impl VoteButton {
    pub fn render(emoji: &str, action: &VoteAction, count: u64) -> VoteResult<Self> {
        Ok(Self {
            label: format!("{emoji} Vote for this participant ({count})"),
            action: action.encode()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;

    fn action(channel: &str) -> VoteAction {
        VoteAction::new(
            ChannelId::new(channel).unwrap(),
            PostId::compose(UserId(123456789), 1_729_300_000_000_000),
        )
    }

    #[test]
    fn test_encode_uses_channel_without_at() {
        let data = action("@my_contest").encode().unwrap();
        assert_eq!(data, "v:my_contest:123456789_1729300000000000");
    }

    #[test]
    fn test_underscored_channel_decodes_intact() {
        let original = action("weekly_photo_contest");
        let decoded = VoteAction::decode(&original.encode().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_ignores_other_callbacks() {
        assert_eq!(VoteAction::decode("help").unwrap(), None);
        assert_eq!(VoteAction::decode("vote_count").unwrap(), None);
    }

    #[test]
    fn test_decode_rejects_malformed_vote_data() {
        assert!(VoteAction::decode("v:channel").is_err());
        assert!(VoteAction::decode("v:channel:123").is_err());
        assert!(VoteAction::decode("v::1_2").is_err());
    }

    #[test]
    fn test_encode_rejects_oversized_data() {
        let long = "c".repeat(40);
        assert!(action(&long).encode().is_err());
    }

    #[test]
    fn test_render_label() {
        let button = VoteButton::render(DEFAULT_BUTTON_EMOJI, &action("news"), 7).unwrap();
        assert_eq!(button.label, "⚡ Vote for this participant (7)");
        assert!(button.action.starts_with("v:news:"));
    }
}
