//! Test doubles for the outbound ports.
//!
//! Public so the integration test crate and the bot crate can drive the
//! core without a live platform.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::domain::{
    ChannelId, CountDelta, CountUpdate, InsertOutcome, LedgerStats, MembershipStatus, MessageRef,
    ParticipantPost, PostId, RegistryStats, UserId, VoteButton, VoteRecord,
};
use crate::error::{EditError, LookupError, SendError, StoreError};
use crate::ports::outbound::{
    ButtonRefresh, MembershipOracle, MessagingPlatform, OperationalLog, ParticipantRegistry,
    RefreshRequest, VoteLedger,
};

#[derive(Clone, Copy, Debug)]
enum Scripted {
    Qualifying(bool),
    Fail,
}

/// Membership oracle answering from a script.
///
/// Unscripted pairs get the default answer (qualifying unless changed).
#[derive(Debug)]
pub struct ScriptedOracle {
    answers: RwLock<HashMap<(UserId, ChannelId), Scripted>>,
    default_qualifying: AtomicBool,
    delay: Mutex<Option<Duration>>,
    queries: AtomicUsize,
}

impl Default for ScriptedOracle {
    fn default() -> Self {
        Self {
            answers: RwLock::new(HashMap::new()),
            default_qualifying: AtomicBool::new(true),
            delay: Mutex::new(None),
            queries: AtomicUsize::new(0),
        }
    }
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Oracle where nobody qualifies unless scripted.
    pub fn denying() -> Self {
        let oracle = Self::default();
        oracle.default_qualifying.store(false, Ordering::SeqCst);
        oracle
    }

    pub fn set(&self, user: UserId, channel: &ChannelId, qualifying: bool) {
        self.answers
            .write()
            .insert((user, channel.clone()), Scripted::Qualifying(qualifying));
    }

    /// The user left `channel`.
    pub fn revoke(&self, user: UserId, channel: &ChannelId) {
        self.set(user, channel, false);
    }

    /// Lookups for this pair fail with `LookupError`.
    pub fn fail(&self, user: UserId, channel: &ChannelId) {
        self.answers
            .write()
            .insert((user, channel.clone()), Scripted::Fail);
    }

    /// Suspend every lookup for `delay` before answering.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MembershipOracle for ScriptedOracle {
    async fn is_qualifying(
        &self,
        user: UserId,
        channel: &ChannelId,
    ) -> Result<bool, LookupError> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.answers.read().get(&(user, channel.clone())).copied();
        match scripted {
            Some(Scripted::Qualifying(answer)) => Ok(answer),
            Some(Scripted::Fail) => Err(LookupError::new(
                user,
                channel.clone(),
                "scripted lookup failure",
            )),
            None => Ok(self.default_qualifying.load(Ordering::SeqCst)),
        }
    }
}

/// Messaging platform that records sends and edits.
#[derive(Debug)]
pub struct RecordingPlatform {
    sends: Mutex<Vec<(ChannelId, String, VoteButton)>>,
    edits: Mutex<Vec<(ChannelId, MessageRef, VoteButton)>>,
    memberships: RwLock<HashMap<(ChannelId, UserId), MembershipStatus>>,
    edit_failure: Mutex<Option<EditError>>,
    fail_sends: AtomicBool,
    next_ref: AtomicI32,
}

impl Default for RecordingPlatform {
    fn default() -> Self {
        Self {
            sends: Mutex::new(Vec::new()),
            edits: Mutex::new(Vec::new()),
            memberships: RwLock::new(HashMap::new()),
            edit_failure: Mutex::new(None),
            fail_sends: AtomicBool::new(false),
            next_ref: AtomicI32::new(1),
        }
    }
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_membership(&self, channel: &ChannelId, user: UserId, status: MembershipStatus) {
        self.memberships.write().insert((channel.clone(), user), status);
    }

    /// Every edit fails with `failure` until reset with `None`.
    pub fn fail_edits_with(&self, failure: Option<EditError>) {
        *self.edit_failure.lock() = failure;
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn sends(&self) -> Vec<(ChannelId, String, VoteButton)> {
        self.sends.lock().clone()
    }

    pub fn edits(&self) -> Vec<(ChannelId, MessageRef, VoteButton)> {
        self.edits.lock().clone()
    }
}

#[async_trait]
impl MessagingPlatform for RecordingPlatform {
    async fn send_message(
        &self,
        channel: &ChannelId,
        text: &str,
        button: &VoteButton,
    ) -> Result<MessageRef, SendError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(SendError {
                channel: channel.clone(),
                reason: "scripted send failure".to_string(),
            });
        }
        self.sends
            .lock()
            .push((channel.clone(), text.to_string(), button.clone()));
        Ok(MessageRef(self.next_ref.fetch_add(1, Ordering::SeqCst)))
    }

    async fn edit_message_button(
        &self,
        channel: &ChannelId,
        message_ref: MessageRef,
        button: &VoteButton,
    ) -> Result<(), EditError> {
        if let Some(failure) = self.edit_failure.lock().clone() {
            return Err(failure);
        }
        self.edits
            .lock()
            .push((channel.clone(), message_ref, button.clone()));
        Ok(())
    }

    async fn get_membership(
        &self,
        channel: &ChannelId,
        user: UserId,
    ) -> Result<MembershipStatus, LookupError> {
        self.memberships
            .read()
            .get(&(channel.clone(), user))
            .copied()
            .ok_or_else(|| LookupError::new(user, channel.clone(), "member not found"))
    }
}

/// Operational log that keeps every published line.
#[derive(Debug, Default)]
pub struct MemoryLog {
    entries: Mutex<Vec<String>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl OperationalLog for MemoryLog {
    async fn publish(&self, text: &str) {
        self.entries.lock().push(text.to_string());
    }
}

/// Button refresh sink that only records requests.
#[derive(Debug, Default)]
pub struct RecordingRefresh {
    requests: Mutex<Vec<RefreshRequest>>,
}

impl RecordingRefresh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<RefreshRequest> {
        self.requests.lock().clone()
    }
}

impl ButtonRefresh for RecordingRefresh {
    fn schedule(&self, request: RefreshRequest) {
        self.requests.lock().push(request);
    }
}

fn injected(operation: &str) -> StoreError {
    StoreError::Backend {
        reason: format!("injected {operation} failure"),
    }
}

/// Registry wrapper whose count updates can be made to fail or stall.
#[derive(Debug)]
pub struct FaultyRegistry<R: ParticipantRegistry> {
    inner: R,
    fail_increments: AtomicBool,
    next_increment_delay: Mutex<Option<Duration>>,
}

impl<R: ParticipantRegistry> FaultyRegistry<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            fail_increments: AtomicBool::new(false),
            next_increment_delay: Mutex::new(None),
        }
    }

    pub fn fail_increments(&self, fail: bool) {
        self.fail_increments.store(fail, Ordering::SeqCst);
    }

    /// The next count update sleeps for `delay` before it is applied.
    pub fn delay_next_increment(&self, delay: Duration) {
        *self.next_increment_delay.lock() = Some(delay);
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

#[async_trait]
impl<R: ParticipantRegistry> ParticipantRegistry for FaultyRegistry<R> {
    async fn create_post(
        &self,
        channel: &ChannelId,
        participant: UserId,
    ) -> Result<ParticipantPost, StoreError> {
        self.inner.create_post(channel, participant).await
    }

    async fn get_post(
        &self,
        channel: &ChannelId,
        post: &PostId,
    ) -> Result<Option<ParticipantPost>, StoreError> {
        self.inner.get_post(channel, post).await
    }

    async fn increment_count(
        &self,
        post: &PostId,
        delta: CountDelta,
    ) -> Result<CountUpdate, StoreError> {
        if self.fail_increments.load(Ordering::SeqCst) {
            return Err(injected("increment"));
        }
        let delay = self.next_increment_delay.lock().take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.increment_count(post, delta).await
    }

    async fn attach_message_ref(
        &self,
        post: &PostId,
        message_ref: MessageRef,
    ) -> Result<(), StoreError> {
        self.inner.attach_message_ref(post, message_ref).await
    }

    async fn channels_with_posts(&self) -> Result<Vec<ChannelId>, StoreError> {
        self.inner.channels_with_posts().await
    }

    async fn posts_in_channel(
        &self,
        channel: &ChannelId,
    ) -> Result<Vec<ParticipantPost>, StoreError> {
        self.inner.posts_in_channel(channel).await
    }

    async fn stats(&self) -> Result<RegistryStats, StoreError> {
        self.inner.stats().await
    }
}

/// Ledger wrapper with switchable failures for deletes and channel scans.
#[derive(Debug)]
pub struct FaultyLedger<L: VoteLedger> {
    inner: L,
    fail_deletes: AtomicBool,
    failing_channels: RwLock<Vec<ChannelId>>,
}

impl<L: VoteLedger> FaultyLedger<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            fail_deletes: AtomicBool::new(false),
            failing_channels: RwLock::new(Vec::new()),
        }
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// `find_by_channel` fails for `channel`.
    pub fn fail_scans_of(&self, channel: &ChannelId) {
        self.failing_channels.write().push(channel.clone());
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }
}

#[async_trait]
impl<L: VoteLedger> VoteLedger for FaultyLedger<L> {
    async fn insert_if_absent(&self, record: VoteRecord) -> Result<InsertOutcome, StoreError> {
        self.inner.insert_if_absent(record).await
    }

    async fn find(
        &self,
        voter: UserId,
        channel: &ChannelId,
        post: &PostId,
    ) -> Result<Option<VoteRecord>, StoreError> {
        self.inner.find(voter, channel, post).await
    }

    async fn find_by_channel(&self, channel: &ChannelId) -> Result<Vec<VoteRecord>, StoreError> {
        if self.failing_channels.read().contains(channel) {
            return Err(injected("scan"));
        }
        self.inner.find_by_channel(channel).await
    }

    async fn delete_one(
        &self,
        voter: UserId,
        channel: &ChannelId,
        post: &PostId,
    ) -> Result<bool, StoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(injected("delete"));
        }
        self.inner.delete_one(voter, channel, post).await
    }

    async fn delete_voter_records(
        &self,
        voter: UserId,
        channel: &ChannelId,
        posts: &[PostId],
    ) -> Result<usize, StoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(injected("delete"));
        }
        self.inner.delete_voter_records(voter, channel, posts).await
    }

    async fn stats(&self) -> Result<LedgerStats, StoreError> {
        self.inner.stats().await
    }
}
