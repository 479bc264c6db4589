//! # Outbound Ports
//!
//! Traits for the external collaborators: the two persistent tables, the
//! membership oracle, the messaging platform and the operational log.

use async_trait::async_trait;

use crate::domain::{
    ChannelId, CountDelta, CountUpdate, InsertOutcome, LedgerStats, MembershipStatus, MessageRef,
    ParticipantPost, PostId, RegistryStats, UserId, VoteButton, VoteRecord,
};
use crate::error::{EditError, LookupError, SendError, StoreError};

/// The `vote_records` table.
///
/// Every mutation is a single targeted operation; no read-modify-write over
/// a cached copy.
#[async_trait]
pub trait VoteLedger: Send + Sync {
    /// Insert unless a record with the same `(voter, post)` exists.
    ///
    /// Must be atomic against concurrent inserts of the same key.
    async fn insert_if_absent(&self, record: VoteRecord) -> Result<InsertOutcome, StoreError>;

    /// Find one record by key.
    async fn find(
        &self,
        voter: UserId,
        channel: &ChannelId,
        post: &PostId,
    ) -> Result<Option<VoteRecord>, StoreError>;

    /// All records cast in a channel.
    async fn find_by_channel(&self, channel: &ChannelId) -> Result<Vec<VoteRecord>, StoreError>;

    /// Delete one record by key. Returns whether it existed.
    async fn delete_one(
        &self,
        voter: UserId,
        channel: &ChannelId,
        post: &PostId,
    ) -> Result<bool, StoreError>;

    /// Bulk delete a voter's records in a channel, limited to `posts`.
    async fn delete_voter_records(
        &self,
        voter: UserId,
        channel: &ChannelId,
        posts: &[PostId],
    ) -> Result<usize, StoreError>;

    async fn stats(&self) -> Result<LedgerStats, StoreError>;
}

/// The `participant_posts` table.
#[async_trait]
pub trait ParticipantRegistry: Send + Sync {
    /// Create a post with a fresh collision-resistant id.
    async fn create_post(
        &self,
        channel: &ChannelId,
        participant: UserId,
    ) -> Result<ParticipantPost, StoreError>;

    /// Post lookup scoped to a channel. A post from another channel is `None`.
    async fn get_post(
        &self,
        channel: &ChannelId,
        post: &PostId,
    ) -> Result<Option<ParticipantPost>, StoreError>;

    /// Atomic ±1 on `vote_count`, clamped at zero.
    async fn increment_count(
        &self,
        post: &PostId,
        delta: CountDelta,
    ) -> Result<CountUpdate, StoreError>;

    async fn attach_message_ref(
        &self,
        post: &PostId,
        message_ref: MessageRef,
    ) -> Result<(), StoreError>;

    /// Channels holding at least one post.
    async fn channels_with_posts(&self) -> Result<Vec<ChannelId>, StoreError>;

    async fn posts_in_channel(
        &self,
        channel: &ChannelId,
    ) -> Result<Vec<ParticipantPost>, StoreError>;

    async fn stats(&self) -> Result<RegistryStats, StoreError>;
}

/// Answers whether a user currently holds a qualifying membership.
#[async_trait]
pub trait MembershipOracle: Send + Sync {
    async fn is_qualifying(&self, user: UserId, channel: &ChannelId)
        -> Result<bool, LookupError>;
}

/// Messaging platform client (message send/edit, membership lookup).
#[async_trait]
pub trait MessagingPlatform: Send + Sync {
    async fn send_message(
        &self,
        channel: &ChannelId,
        text: &str,
        button: &VoteButton,
    ) -> Result<MessageRef, SendError>;

    async fn edit_message_button(
        &self,
        channel: &ChannelId,
        message_ref: MessageRef,
        button: &VoteButton,
    ) -> Result<(), EditError>;

    async fn get_membership(
        &self,
        channel: &ChannelId,
        user: UserId,
    ) -> Result<MembershipStatus, LookupError>;
}

/// Operational log channel. Best effort; failures stay inside the sink.
#[async_trait]
pub trait OperationalLog: Send + Sync {
    async fn publish(&self, text: &str);
}

/// Log sink that drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopLog;

#[async_trait]
impl OperationalLog for NoopLog {
    async fn publish(&self, _text: &str) {}
}

/// A request to re-render the vote button of one post.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshRequest {
    pub channel: ChannelId,
    pub post_id: PostId,
}

impl RefreshRequest {
    pub fn new(channel: ChannelId, post_id: PostId) -> Self {
        Self { channel, post_id }
    }
}

/// Fire-and-forget button refresh.
///
/// `schedule` never blocks and never fails from the caller's point of view.
pub trait ButtonRefresh: Send + Sync {
    fn schedule(&self, request: RefreshRequest);
}
