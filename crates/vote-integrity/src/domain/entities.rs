//! # Domain Entities
//!
//! Ledger entries, participant posts and the outcomes/reports produced by
//! the vote transaction processor and the reconciliation sweeper.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::value_objects::{ChannelId, MessageRef, PostId, UserId};

/// One cast vote. Immutable once created; only ever deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub voter_id: UserId,
    pub post_id: PostId,
    pub channel_id: ChannelId,
    pub cast_at: DateTime<Utc>,
}

impl VoteRecord {
    pub fn new(
        voter_id: UserId,
        post_id: PostId,
        channel_id: ChannelId,
        cast_at: DateTime<Utc>,
    ) -> Self {
        Self {
            voter_id,
            post_id,
            channel_id,
            cast_at,
        }
    }

    /// Uniqueness key: at most one record per `(voter, post)`.
    pub fn key(&self) -> VoteKey {
        VoteKey {
            voter_id: self.voter_id,
            post_id: self.post_id.clone(),
        }
    }
}

/// Ledger uniqueness key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoteKey {
    pub voter_id: UserId,
    pub post_id: PostId,
}

/// A participant card posted into a channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantPost {
    pub post_id: PostId,
    pub channel_id: ChannelId,
    pub participant_user_id: UserId,
    /// Equals the number of live vote records for `post_id` at quiescence.
    pub vote_count: u64,
    /// Set once the card has been sent to the channel.
    pub channel_message_ref: Option<MessageRef>,
    pub created_at: DateTime<Utc>,
}

impl ParticipantPost {
    pub fn new(post_id: PostId, channel_id: ChannelId, created_at: DateTime<Utc>) -> Self {
        Self {
            participant_user_id: post_id.participant(),
            post_id,
            channel_id,
            vote_count: 0,
            channel_message_ref: None,
            created_at,
        }
    }
}

/// Membership of a user in a channel as reported by the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MembershipStatus {
    Owner,
    Administrator,
    Member,
    Restricted { is_member: bool },
    Left,
    Banned,
}

impl MembershipStatus {
    /// Owner, administrator and member qualify; left and banned do not.
    pub fn is_qualifying(&self) -> bool {
        match self {
            Self::Owner | Self::Administrator | Self::Member => true,
            Self::Restricted { is_member } => *is_member,
            Self::Left | Self::Banned => false,
        }
    }
}

/// Direction of a vote count change. Counts only ever move by one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountDelta {
    Increment,
    Decrement,
}

/// Result of a registry count update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CountUpdate {
    pub new_count: u64,
    /// A decrement hit zero and was ignored.
    pub clamped: bool,
}

impl CountUpdate {
    /// Apply `delta` to `current`, clamping at zero.
    pub fn apply(current: u64, delta: CountDelta) -> Self {
        match delta {
            CountDelta::Increment => Self {
                new_count: current.saturating_add(1),
                clamped: false,
            },
            CountDelta::Decrement if current == 0 => Self {
                new_count: 0,
                clamped: true,
            },
            CountDelta::Decrement => Self {
                new_count: current - 1,
                clamped: false,
            },
        }
    }
}

/// Result of a conditional ledger insert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

/// Why a vote was refused. No state is mutated on any rejection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    NotSubscribed,
    DuplicateVote,
    InvalidTarget,
}

/// Outcome of `cast_vote`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteOutcome {
    Accepted { new_count: u64 },
    Rejected(RejectReason),
}

impl VoteOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// Short label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Accepted { .. } => "accepted",
            Self::Rejected(RejectReason::NotSubscribed) => "not_subscribed",
            Self::Rejected(RejectReason::DuplicateVote) => "duplicate",
            Self::Rejected(RejectReason::InvalidTarget) => "invalid_target",
        }
    }
}

/// Profile of a user entering a poll, used to render the participant card.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParticipantProfile {
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl ParticipantProfile {
    pub fn display_name(&self) -> String {
        let first = if self.first_name.trim().is_empty() {
            "User"
        } else {
            self.first_name.trim()
        };
        match self.last_name.as_deref().map(str::trim) {
            Some(last) if !last.is_empty() => format!("{first} {last}"),
            _ => first.to_string(),
        }
    }

    pub fn username_display(&self) -> String {
        match self.username.as_deref() {
            Some(name) if !name.is_empty() => format!("@{name}"),
            _ => "no username".to_string(),
        }
    }
}

/// Aggregate counts from the vote ledger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub votes: usize,
    pub unique_voters: usize,
}

/// Aggregate counts from the participant registry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub posts: usize,
    pub channels: usize,
}

/// Result of one reconciliation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub channels_scanned: usize,
    /// Channels whose records could not be loaded this pass.
    pub channels_failed: usize,
    pub voters_checked: usize,
    pub voters_disqualified: usize,
    /// Voters skipped because a membership lookup failed.
    pub voters_deferred: usize,
    pub votes_retracted: usize,
    pub clamped_decrements: usize,
    /// Clamped records kept because their increment may still be in flight.
    pub votes_unsettled: usize,
    pub duration: Duration,
}

/// Periodic maintenance snapshot. No coupling to voting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub channels: usize,
    pub posts: usize,
    pub votes: usize,
    pub unique_voters: usize,
    /// Posts whose count disagreed with the ledger when audited.
    pub count_mismatches: usize,
    pub taken_at: DateTime<Utc>,
}

/// Scheduler state after the most recent pass.
#[derive(Clone, Debug, Default)]
pub struct SweeperStatus {
    pub running: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_report: Option<SweepReport>,
}
