//! # Integration Flows
//!
//! Processor, sweeper, participation and the refresh worker wired together
//! over the in-memory tables.

pub mod reconciliation;
pub mod voting;

use std::sync::Arc;

use tokio::task::JoinHandle;

use vote_integrity::adapters::testing::{MemoryLog, RecordingPlatform, ScriptedOracle};
use vote_integrity::adapters::{
    refresh_channel, InMemoryParticipantRegistry, InMemoryVoteLedger, RefreshQueue, RefreshStats,
};
use vote_integrity::domain::{invariant_count_matches_ledger, invariant_single_vote_per_post};
use vote_integrity::ports::inbound::ParticipationApi;
use vote_integrity::{
    ChannelId, ParticipantPost, ParticipantProfile, ParticipationService, ReconciliationSweeper,
    UserId, VoteConfig, VoteProcessor,
};

pub type Processor =
    VoteProcessor<InMemoryVoteLedger, InMemoryParticipantRegistry, ScriptedOracle, RefreshQueue>;

pub type Sweeper = ReconciliationSweeper<
    InMemoryVoteLedger,
    InMemoryParticipantRegistry,
    ScriptedOracle,
    RefreshQueue,
    MemoryLog,
>;

pub type Participation =
    ParticipationService<InMemoryParticipantRegistry, RecordingPlatform, MemoryLog>;

/// Everything a bot process would wire, minus Telegram.
pub struct Harness {
    pub ledger: Arc<InMemoryVoteLedger>,
    pub registry: Arc<InMemoryParticipantRegistry>,
    pub oracle: Arc<ScriptedOracle>,
    pub platform: Arc<RecordingPlatform>,
    pub log: Arc<MemoryLog>,
    pub processor: Arc<Processor>,
    pub sweeper: Arc<Sweeper>,
    pub participation: Participation,
    worker: JoinHandle<RefreshStats>,
}

impl Harness {
    pub fn new(config: VoteConfig) -> Self {
        Self::with_oracle(config, ScriptedOracle::new())
    }

    pub fn with_oracle(config: VoteConfig, oracle: ScriptedOracle) -> Self {
        let ledger = Arc::new(InMemoryVoteLedger::new());
        let registry = Arc::new(InMemoryParticipantRegistry::new());
        let oracle = Arc::new(oracle);
        let platform = Arc::new(RecordingPlatform::new());
        let log = Arc::new(MemoryLog::new());

        let (queue, worker) = refresh_channel(
            Arc::clone(&registry),
            Arc::clone(&platform),
            config.button_emoji.clone(),
        );
        let queue = Arc::new(queue);
        let worker = tokio::spawn(worker.run());

        let processor = Arc::new(VoteProcessor::new(
            Arc::clone(&ledger),
            Arc::clone(&registry),
            Arc::clone(&oracle),
            Arc::clone(&queue),
            config.clone(),
        ));
        let sweeper = Arc::new(ReconciliationSweeper::new(
            Arc::clone(&ledger),
            Arc::clone(&registry),
            Arc::clone(&oracle),
            queue,
            Arc::clone(&log),
            config.clone(),
        ));
        let participation = ParticipationService::new(
            Arc::clone(&registry),
            Arc::clone(&platform),
            Arc::clone(&log),
            config.button_emoji,
        );

        Self {
            ledger,
            registry,
            oracle,
            platform,
            log,
            processor,
            sweeper,
            participation,
            worker,
        }
    }

    /// Post a participant card for `participant` in `channel`.
    pub async fn post(&self, channel: &ChannelId, participant: u64) -> ParticipantPost {
        let profile = ParticipantProfile {
            user_id: UserId(participant),
            first_name: format!("Participant {participant}"),
            last_name: None,
            username: None,
        };
        self.participation
            .participate(channel, &profile)
            .await
            .expect("participation succeeds")
    }

    pub fn count(&self, post: &ParticipantPost) -> u64 {
        self.registry
            .all_posts()
            .into_iter()
            .find(|p| p.post_id == post.post_id)
            .map(|p| p.vote_count)
            .expect("post exists")
    }

    /// Both table invariants hold right now.
    pub fn assert_quiescent_invariants(&self) {
        let records = self.ledger.all_records();
        invariant_single_vote_per_post(&records).expect("one vote per voter and post");
        invariant_count_matches_ledger(&self.registry.all_posts(), &records)
            .expect("counts match the ledger");
    }

    /// Drop every queue handle and wait for the refresh worker to drain.
    pub async fn finish(self) -> (Arc<RecordingPlatform>, RefreshStats) {
        let Self {
            platform,
            processor,
            sweeper,
            worker,
            ..
        } = self;
        drop(processor);
        drop(sweeper);
        let stats = worker.await.expect("refresh worker joins");
        (platform, stats)
    }
}

pub fn channel(name: &str) -> ChannelId {
    ChannelId::new(name).expect("valid channel")
}
