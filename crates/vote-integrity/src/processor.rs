//! # Vote Transaction Processor
//!
//! Invoked once per vote click. Many invocations run concurrently; the
//! only serialization point is the ledger's conditional insert.
//!
//! ## Flow
//!
//! 1. Resolve the post in the channel (`InvalidTarget` otherwise)
//! 2. Check every required channel; any lookup error rejects the vote
//! 3. Conditional insert of the vote record (`DuplicateVote` if present)
//! 4. Increment the post's count; on failure delete the record again
//! 5. Queue a button refresh

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::VoteConfig;
use crate::domain::{
    ChannelId, CountDelta, InsertOutcome, PostId, RejectReason, UserId, VoteOutcome, VoteRecord,
};
use crate::error::VoteResult;
use crate::ports::inbound::VoteApi;
use crate::ports::outbound::{
    ButtonRefresh, MembershipOracle, ParticipantRegistry, RefreshRequest, VoteLedger,
};

pub struct VoteProcessor<L, R, O, B>
where
    L: VoteLedger,
    R: ParticipantRegistry,
    O: MembershipOracle,
    B: ButtonRefresh,
{
    ledger: Arc<L>,
    registry: Arc<R>,
    oracle: Arc<O>,
    refresh: Arc<B>,
    config: VoteConfig,
}

impl<L, R, O, B> VoteProcessor<L, R, O, B>
where
    L: VoteLedger,
    R: ParticipantRegistry,
    O: MembershipOracle,
    B: ButtonRefresh,
{
    pub fn new(
        ledger: Arc<L>,
        registry: Arc<R>,
        oracle: Arc<O>,
        refresh: Arc<B>,
        config: VoteConfig,
    ) -> Self {
        Self {
            ledger,
            registry,
            oracle,
            refresh,
            config,
        }
    }

    pub fn config(&self) -> &VoteConfig {
        &self.config
    }

    /// Fail-closed membership check over the required-subscription set.
    async fn voter_qualifies(&self, voter: UserId, channel: &ChannelId) -> bool {
        for required in self.config.required_channels_for(channel) {
            match self.oracle.is_qualifying(voter, &required).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(voter_id = %voter, channel = %required, "Voter not subscribed");
                    return false;
                }
                Err(err) => {
                    warn!(
                        voter_id = %voter,
                        channel = %required,
                        error = %err,
                        "Membership lookup failed; rejecting vote"
                    );
                    return false;
                }
            }
        }
        true
    }
}

#[async_trait]
impl<L, R, O, B> VoteApi for VoteProcessor<L, R, O, B>
where
    L: VoteLedger,
    R: ParticipantRegistry,
    O: MembershipOracle,
    B: ButtonRefresh,
{
    async fn cast_vote(
        &self,
        voter: UserId,
        channel: &ChannelId,
        post: &PostId,
    ) -> VoteResult<VoteOutcome> {
        if self.registry.get_post(channel, post).await?.is_none() {
            debug!(voter_id = %voter, post_id = %post, channel = %channel, "Vote for unknown post");
            return Ok(VoteOutcome::Rejected(RejectReason::InvalidTarget));
        }

        if !self.voter_qualifies(voter, channel).await {
            return Ok(VoteOutcome::Rejected(RejectReason::NotSubscribed));
        }

        // Fast path; the conditional insert below is what actually decides.
        if self.ledger.find(voter, channel, post).await?.is_some() {
            return Ok(VoteOutcome::Rejected(RejectReason::DuplicateVote));
        }

        let record = VoteRecord::new(voter, post.clone(), channel.clone(), Utc::now());
        if self.ledger.insert_if_absent(record).await? == InsertOutcome::AlreadyExists {
            debug!(voter_id = %voter, post_id = %post, "Concurrent duplicate vote rejected");
            return Ok(VoteOutcome::Rejected(RejectReason::DuplicateVote));
        }

        let update = match self.registry.increment_count(post, CountDelta::Increment).await {
            Ok(update) => update,
            Err(err) => {
                warn!(
                    voter_id = %voter,
                    post_id = %post,
                    error = %err,
                    "Count increment failed; removing vote record"
                );
                if let Err(rollback) = self.ledger.delete_one(voter, channel, post).await {
                    error!(
                        voter_id = %voter,
                        post_id = %post,
                        error = %rollback,
                        "Compensating delete failed; ledger and count diverge until audited"
                    );
                }
                return Err(err.into());
            }
        };

        self.refresh
            .schedule(RefreshRequest::new(channel.clone(), post.clone()));

        info!(
            voter_id = %voter,
            post_id = %post,
            channel = %channel,
            count = update.new_count,
            "Vote accepted"
        );

        Ok(VoteOutcome::Accepted {
            new_count: update.new_count,
        })
    }
}
