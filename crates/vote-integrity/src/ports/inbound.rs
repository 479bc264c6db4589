//! # Inbound Ports
//!
//! API traits defining what the vote-integrity subsystem can do.

use async_trait::async_trait;

use crate::domain::{
    ChannelId, ParticipantPost, ParticipantProfile, PostId, StatsSnapshot, SweepReport,
    SweeperStatus, UserId, VoteOutcome,
};
use crate::error::VoteResult;

/// Vote casting - invoked once per vote click.
#[async_trait]
pub trait VoteApi: Send + Sync {
    /// Rejections are `Ok(VoteOutcome::Rejected(_))`; `Err` means a store
    /// failure the voter may retry.
    async fn cast_vote(
        &self,
        voter: UserId,
        channel: &ChannelId,
        post: &PostId,
    ) -> VoteResult<VoteOutcome>;
}

/// Periodic reconciliation of votes against current membership.
#[async_trait]
pub trait ReconciliationApi: Send + Sync {
    /// One full pass. Never fails as a whole; per-channel and per-voter
    /// failures are counted in the report.
    async fn run_reconciliation_sweep(&self) -> SweepReport;

    /// Statistics snapshot and count audit.
    async fn run_maintenance(&self) -> VoteResult<StatsSnapshot>;

    fn status(&self) -> SweeperStatus;
}

/// Posting participant cards.
#[async_trait]
pub trait ParticipationApi: Send + Sync {
    async fn participate(
        &self,
        channel: &ChannelId,
        profile: &ParticipantProfile,
    ) -> VoteResult<ParticipantPost>;
}
