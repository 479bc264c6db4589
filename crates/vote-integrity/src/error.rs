//! Error types for the vote-integrity core.
//!
//! Every error here is handled at an operation boundary. None of them is
//! fatal to the process.

use thiserror::Error;

use crate::domain::{ChannelId, PostId, UserId};

/// Persistent store failures (vote ledger and participant registry).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Post is not in the registry.
    #[error("Participant post not found: {post_id}")]
    PostNotFound { post_id: PostId },

    /// A post with this id already exists.
    #[error("Participant post already exists: {post_id}")]
    PostExists { post_id: PostId },

    /// Backend I/O failure.
    #[error("Storage backend error: {reason}")]
    Backend { reason: String },

    /// Stored bytes could not be encoded or decoded.
    #[error("Serialization error: {reason}")]
    Serialization { reason: String },
}

/// Membership lookup failure (e.g. the bot cannot see the channel).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Membership lookup failed for user {user_id} in {channel}: {reason}")]
pub struct LookupError {
    pub user_id: UserId,
    pub channel: ChannelId,
    pub reason: String,
}

impl LookupError {
    pub fn new(user_id: UserId, channel: ChannelId, reason: impl Into<String>) -> Self {
        Self {
            user_id,
            channel,
            reason: reason.into(),
        }
    }
}

/// Failure to refresh a vote button. Never affects a committed vote.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    /// The platform reports the markup is unchanged.
    #[error("Message not modified")]
    NotModified,

    /// The channel message no longer exists.
    #[error("Message to edit not found")]
    MessageNotFound,

    /// Any other platform failure.
    #[error("Platform error while editing button: {reason}")]
    Platform { reason: String },
}

/// Failure to post a participant card.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to send message to {channel}: {reason}")]
pub struct SendError {
    pub channel: ChannelId,
    pub reason: String,
}

/// Errors surfaced by the vote-integrity operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteError {
    /// A user, channel or post identifier failed validation.
    #[error("Invalid identifier: {reason}")]
    InvalidIdentifier { reason: String },

    /// Configuration rejected at construction time.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Ledger and registry disagree.
    #[error("Invariant violated: {reason}")]
    InvariantViolation { reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Send(#[from] SendError),

    #[error(transparent)]
    Edit(#[from] EditError),
}

impl VoteError {
    pub(crate) fn invalid_identifier(reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            reason: reason.into(),
        }
    }
}

/// Result type for vote-integrity operations.
pub type VoteResult<T> = Result<T, VoteError>;
