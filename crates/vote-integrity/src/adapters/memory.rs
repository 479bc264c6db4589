//! In-memory vote ledger and participant registry.
//!
//! Default backend for development and tests. Each operation takes the
//! table lock once, so conditional insert and count updates are atomic.

use std::collections::{BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tracing::warn;

use crate::domain::{
    ChannelId, CountDelta, CountUpdate, InsertOutcome, LedgerStats, MessageRef, ParticipantPost,
    PostId, PostIdGenerator, RegistryStats, UserId, VoteKey, VoteRecord,
};
use crate::error::StoreError;
use crate::ports::outbound::{ParticipantRegistry, VoteLedger};

/// In-memory `vote_records` table keyed by `(voter, post)`.
#[derive(Debug, Default)]
pub struct InMemoryVoteLedger {
    records: RwLock<HashMap<VoteKey, VoteRecord>>,
}

impl InMemoryVoteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every live record.
    pub fn all_records(&self) -> Vec<VoteRecord> {
        self.records.read().values().cloned().collect()
    }
}

fn key(voter: UserId, post: &PostId) -> VoteKey {
    VoteKey {
        voter_id: voter,
        post_id: post.clone(),
    }
}

#[async_trait]
impl VoteLedger for InMemoryVoteLedger {
    async fn insert_if_absent(&self, record: VoteRecord) -> Result<InsertOutcome, StoreError> {
        let mut records = self.records.write();
        let entry_key = record.key();
        if records.contains_key(&entry_key) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        records.insert(entry_key, record);
        Ok(InsertOutcome::Inserted)
    }

    async fn find(
        &self,
        voter: UserId,
        channel: &ChannelId,
        post: &PostId,
    ) -> Result<Option<VoteRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .get(&key(voter, post))
            .filter(|record| &record.channel_id == channel)
            .cloned())
    }

    async fn find_by_channel(&self, channel: &ChannelId) -> Result<Vec<VoteRecord>, StoreError> {
        let mut found: Vec<VoteRecord> = self
            .records
            .read()
            .values()
            .filter(|record| &record.channel_id == channel)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(found)
    }

    async fn delete_one(
        &self,
        voter: UserId,
        channel: &ChannelId,
        post: &PostId,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.write();
        let entry_key = key(voter, post);
        match records.get(&entry_key) {
            Some(record) if &record.channel_id == channel => {
                records.remove(&entry_key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_voter_records(
        &self,
        voter: UserId,
        channel: &ChannelId,
        posts: &[PostId],
    ) -> Result<usize, StoreError> {
        let targets: HashSet<&PostId> = posts.iter().collect();
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|entry_key, record| {
            !(entry_key.voter_id == voter
                && &record.channel_id == channel
                && targets.contains(&entry_key.post_id))
        });
        Ok(before - records.len())
    }

    async fn stats(&self) -> Result<LedgerStats, StoreError> {
        let records = self.records.read();
        let voters: HashSet<UserId> = records.keys().map(|k| k.voter_id).collect();
        Ok(LedgerStats {
            votes: records.len(),
            unique_voters: voters.len(),
        })
    }
}

/// In-memory `participant_posts` table keyed by post id.
#[derive(Debug, Default)]
pub struct InMemoryParticipantRegistry {
    posts: RwLock<HashMap<PostId, ParticipantPost>>,
    ids: PostIdGenerator,
}

impl InMemoryParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed post, e.g. when seeding a test fixture.
    pub fn insert_post(&self, post: ParticipantPost) -> Result<(), StoreError> {
        let mut posts = self.posts.write();
        if posts.contains_key(&post.post_id) {
            return Err(StoreError::PostExists {
                post_id: post.post_id,
            });
        }
        posts.insert(post.post_id.clone(), post);
        Ok(())
    }

    /// Snapshot of every post.
    pub fn all_posts(&self) -> Vec<ParticipantPost> {
        self.posts.read().values().cloned().collect()
    }
}

#[async_trait]
impl ParticipantRegistry for InMemoryParticipantRegistry {
    async fn create_post(
        &self,
        channel: &ChannelId,
        participant: UserId,
    ) -> Result<ParticipantPost, StoreError> {
        let post = ParticipantPost::new(self.ids.next(participant), channel.clone(), Utc::now());
        self.insert_post(post.clone())?;
        Ok(post)
    }

    async fn get_post(
        &self,
        channel: &ChannelId,
        post: &PostId,
    ) -> Result<Option<ParticipantPost>, StoreError> {
        Ok(self
            .posts
            .read()
            .get(post)
            .filter(|found| &found.channel_id == channel)
            .cloned())
    }

    async fn increment_count(
        &self,
        post: &PostId,
        delta: CountDelta,
    ) -> Result<CountUpdate, StoreError> {
        let mut posts = self.posts.write();
        let entry = posts.get_mut(post).ok_or_else(|| StoreError::PostNotFound {
            post_id: post.clone(),
        })?;

        let update = CountUpdate::apply(entry.vote_count, delta);
        if update.clamped {
            warn!(post_id = %post, "Decrement on a post already at zero votes; clamped");
        }
        entry.vote_count = update.new_count;
        Ok(update)
    }

    async fn attach_message_ref(
        &self,
        post: &PostId,
        message_ref: MessageRef,
    ) -> Result<(), StoreError> {
        let mut posts = self.posts.write();
        let entry = posts.get_mut(post).ok_or_else(|| StoreError::PostNotFound {
            post_id: post.clone(),
        })?;
        entry.channel_message_ref = Some(message_ref);
        Ok(())
    }

    async fn channels_with_posts(&self) -> Result<Vec<ChannelId>, StoreError> {
        let channels: BTreeSet<ChannelId> = self
            .posts
            .read()
            .values()
            .map(|post| post.channel_id.clone())
            .collect();
        Ok(channels.into_iter().collect())
    }

    async fn posts_in_channel(
        &self,
        channel: &ChannelId,
    ) -> Result<Vec<ParticipantPost>, StoreError> {
        let mut posts: Vec<ParticipantPost> = self
            .posts
            .read()
            .values()
            .filter(|post| &post.channel_id == channel)
            .cloned()
            .collect();
        posts.sort_by(|a, b| a.post_id.cmp(&b.post_id));
        Ok(posts)
    }

    async fn stats(&self) -> Result<RegistryStats, StoreError> {
        let posts = self.posts.read();
        let channels: HashSet<&ChannelId> = posts.values().map(|post| &post.channel_id).collect();
        Ok(RegistryStats {
            posts: posts.len(),
            channels: channels.len(),
        })
    }
}
