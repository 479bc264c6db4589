//! # Reconciliation Sweeper
//!
//! Periodic job that re-checks every voter's subscriptions and retracts the
//! votes of voters who no longer qualify.
//!
//! ## Guarantees
//!
//! - Passes never overlap: scheduled passes and direct
//!   `run_reconciliation_sweep` calls share one async mutex
//! - A lookup error defers that voter to the next pass; it never aborts the
//!   pass for other voters or channels
//! - Button refreshes are queued and never roll back a decrement
//! - A vote whose increment has not landed yet is never deleted
//!
//! A separate, slower maintenance timer publishes a statistics snapshot and
//! audits counts against the ledger. It never mutates anything.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::VoteConfig;
use crate::domain::{
    count_mismatches, ChannelId, CountDelta, PostId, StatsSnapshot, SweepReport, SweeperStatus,
    UserId, VoteRecord,
};
use crate::error::{StoreError, VoteResult};
use crate::ports::inbound::ReconciliationApi;
use crate::ports::outbound::{
    ButtonRefresh, MembershipOracle, OperationalLog, ParticipantRegistry, RefreshRequest,
    VoteLedger,
};

type ReportHook = Box<dyn Fn(&SweepReport) + Send + Sync>;
type SnapshotHook = Box<dyn Fn(&StatsSnapshot) + Send + Sync>;

/// Per-pass membership answers. `None` records a failed lookup.
type MembershipCache = HashMap<(UserId, ChannelId), Option<bool>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Verdict {
    Qualifies,
    Disqualified,
    Deferred,
}

pub struct ReconciliationSweeper<L, R, O, B, G>
where
    L: VoteLedger,
    R: ParticipantRegistry,
    O: MembershipOracle,
    B: ButtonRefresh,
    G: OperationalLog,
{
    ledger: Arc<L>,
    registry: Arc<R>,
    oracle: Arc<O>,
    refresh: Arc<B>,
    log: Arc<G>,
    config: VoteConfig,
    pass_guard: Mutex<()>,
    status: RwLock<SweeperStatus>,
    report_hook: Option<ReportHook>,
    snapshot_hook: Option<SnapshotHook>,
}

impl<L, R, O, B, G> ReconciliationSweeper<L, R, O, B, G>
where
    L: VoteLedger + 'static,
    R: ParticipantRegistry + 'static,
    O: MembershipOracle + 'static,
    B: ButtonRefresh + 'static,
    G: OperationalLog + 'static,
{
    pub fn new(
        ledger: Arc<L>,
        registry: Arc<R>,
        oracle: Arc<O>,
        refresh: Arc<B>,
        log: Arc<G>,
        config: VoteConfig,
    ) -> Self {
        Self {
            ledger,
            registry,
            oracle,
            refresh,
            log,
            config,
            pass_guard: Mutex::new(()),
            status: RwLock::new(SweeperStatus::default()),
            report_hook: None,
            snapshot_hook: None,
        }
    }

    /// Called with every finished report, e.g. to record metrics.
    pub fn with_report_hook(mut self, hook: impl Fn(&SweepReport) + Send + Sync + 'static) -> Self {
        self.report_hook = Some(Box::new(hook));
        self
    }

    /// Called with every maintenance snapshot.
    pub fn with_snapshot_hook(
        mut self,
        hook: impl Fn(&StatsSnapshot) + Send + Sync + 'static,
    ) -> Self {
        self.snapshot_hook = Some(Box::new(hook));
        self
    }

    /// Start the sweep and maintenance timers.
    ///
    /// The first tick of each timer fires one full period after spawning.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let sweep_every = self.config.sweep_interval;
        let maintenance_every = self.config.maintenance_interval;

        tokio::spawn(async move {
            let mut sweep_timer = timer(sweep_every);
            let mut maintenance_timer = timer(maintenance_every);

            info!(
                sweep_interval_secs = sweep_every.as_secs(),
                maintenance_interval_secs = maintenance_every.as_secs(),
                "Reconciliation sweeper started"
            );

            loop {
                tokio::select! {
                    _ = sweep_timer.tick() => {
                        self.sweep_pass().await;
                    }
                    _ = maintenance_timer.tick() => {
                        if let Err(err) = self.maintenance_pass().await {
                            warn!(error = %err, "Maintenance pass failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Reconciliation sweeper stopping");
                            break;
                        }
                    }
                }
            }
        })
    }

    async fn sweep_pass(&self) -> SweepReport {
        let _pass = self.pass_guard.lock().await;
        self.status.write().running = true;

        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let mut report = SweepReport::default();
        let mut cache = MembershipCache::new();

        debug!(%run_id, "Reconciliation sweep starting");

        match self.registry.channels_with_posts().await {
            Ok(channels) => {
                for channel in channels {
                    self.sweep_channel(&channel, &mut cache, &mut report).await;
                }
            }
            Err(err) => {
                warn!(%run_id, error = %err, "Could not list channels; sweep skipped");
            }
        }

        report.duration = started.elapsed();

        info!(
            %run_id,
            channels = report.channels_scanned,
            channels_failed = report.channels_failed,
            voters = report.voters_checked,
            disqualified = report.voters_disqualified,
            deferred = report.voters_deferred,
            retracted = report.votes_retracted,
            unsettled = report.votes_unsettled,
            duration_ms = report.duration.as_millis() as u64,
            "Reconciliation sweep finished"
        );

        if report.votes_retracted > 0 {
            self.log
                .publish(&format!(
                    "Subscription check: {} voter(s) no longer subscribed, {} vote(s) removed across {} channel(s)",
                    report.voters_disqualified, report.votes_retracted, report.channels_scanned
                ))
                .await;
        }

        if let Some(hook) = &self.report_hook {
            hook(&report);
        }

        let mut status = self.status.write();
        status.running = false;
        status.last_run_at = Some(Utc::now());
        status.last_report = Some(report.clone());

        report
    }

    async fn sweep_channel(
        &self,
        channel: &ChannelId,
        cache: &mut MembershipCache,
        report: &mut SweepReport,
    ) {
        let records = match self.ledger.find_by_channel(channel).await {
            Ok(records) => records,
            Err(err) => {
                warn!(channel = %channel, error = %err, "Could not load votes; channel skipped");
                report.channels_failed += 1;
                return;
            }
        };
        report.channels_scanned += 1;

        let mut by_voter: BTreeMap<UserId, Vec<VoteRecord>> = BTreeMap::new();
        for record in records {
            by_voter.entry(record.voter_id).or_default().push(record);
        }

        for (voter, records) in by_voter {
            report.voters_checked += 1;
            match self.check_voter(voter, channel, cache).await {
                Verdict::Qualifies => {}
                Verdict::Deferred => {
                    warn!(voter_id = %voter, channel = %channel, "Membership unknown; voter deferred");
                    report.voters_deferred += 1;
                }
                Verdict::Disqualified => {
                    report.voters_disqualified += 1;
                    let retracted = self.retract(voter, channel, &records, report).await;
                    report.votes_retracted += retracted;
                    if retracted > 0 {
                        self.log
                            .publish(&format!(
                                "Removed {retracted} vote(s) by user {voter} in {channel}: no longer subscribed"
                            ))
                            .await;
                    }
                }
            }
        }
    }

    async fn check_voter(
        &self,
        voter: UserId,
        channel: &ChannelId,
        cache: &mut MembershipCache,
    ) -> Verdict {
        let mut verdict = Verdict::Qualifies;

        for required in self.config.required_channels_for(channel) {
            let key = (voter, required.clone());
            let answer = match cache.get(&key).copied() {
                Some(answer) => answer,
                None => {
                    let answer = match self.oracle.is_qualifying(voter, &required).await {
                        Ok(qualifying) => Some(qualifying),
                        Err(err) => {
                            debug!(error = %err, "Membership lookup failed during sweep");
                            None
                        }
                    };
                    cache.insert(key, answer);
                    answer
                }
            };

            match answer {
                None => return Verdict::Deferred,
                Some(false) => verdict = Verdict::Disqualified,
                Some(true) => {}
            }
        }

        verdict
    }

    /// Decrement, queue a refresh, then bulk-delete the voter's records.
    ///
    /// Records whose decrement failed stay for the next pass. So do fresh
    /// records whose decrement clamped: their increment is still pending and
    /// would otherwise land on a count with no record behind it. If the bulk
    /// delete fails the decrements are undone.
    async fn retract(
        &self,
        voter: UserId,
        channel: &ChannelId,
        records: &[VoteRecord],
        report: &mut SweepReport,
    ) -> usize {
        let mut retractable: Vec<PostId> = Vec::with_capacity(records.len());
        let mut decremented: Vec<PostId> = Vec::with_capacity(records.len());
        let now = Utc::now();

        for record in records {
            match self
                .registry
                .increment_count(&record.post_id, CountDelta::Decrement)
                .await
            {
                Ok(update) => {
                    if update.clamped {
                        report.clamped_decrements += 1;
                        if self.is_settling(record, now) {
                            debug!(
                                voter_id = %voter,
                                post_id = %record.post_id,
                                "Clamped decrement on a fresh vote; kept for the next pass"
                            );
                            report.votes_unsettled += 1;
                            continue;
                        }
                    } else {
                        decremented.push(record.post_id.clone());
                    }
                    retractable.push(record.post_id.clone());
                    self.refresh
                        .schedule(RefreshRequest::new(channel.clone(), record.post_id.clone()));
                }
                Err(StoreError::PostNotFound { .. }) => {
                    debug!(post_id = %record.post_id, "Vote references a missing post; removing");
                    retractable.push(record.post_id.clone());
                }
                Err(err) => {
                    warn!(
                        voter_id = %voter,
                        post_id = %record.post_id,
                        error = %err,
                        "Decrement failed; vote kept for the next pass"
                    );
                }
            }
        }

        if retractable.is_empty() {
            return 0;
        }

        match self
            .ledger
            .delete_voter_records(voter, channel, &retractable)
            .await
        {
            Ok(removed) => {
                info!(voter_id = %voter, channel = %channel, removed, "Votes retracted");
                removed
            }
            Err(err) => {
                error!(
                    voter_id = %voter,
                    channel = %channel,
                    error = %err,
                    "Vote delete failed; restoring counts"
                );
                self.restore_counts(channel, &decremented).await;
                0
            }
        }
    }

    fn is_settling(&self, record: &VoteRecord, now: DateTime<Utc>) -> bool {
        match (now - record.cast_at).to_std() {
            Ok(age) => age < self.config.settle_window,
            // Cast "in the future" by clock skew
            Err(_) => true,
        }
    }

    async fn restore_counts(&self, channel: &ChannelId, posts: &[PostId]) {
        for post in posts {
            match self
                .registry
                .increment_count(post, CountDelta::Increment)
                .await
            {
                Ok(_) => self
                    .refresh
                    .schedule(RefreshRequest::new(channel.clone(), post.clone())),
                Err(err) => error!(
                    post_id = %post,
                    error = %err,
                    "Count restore failed; post stays below its ledger count until audited"
                ),
            }
        }
    }

    async fn maintenance_pass(&self) -> VoteResult<StatsSnapshot> {
        let _pass = self.pass_guard.lock().await;

        let ledger_stats = self.ledger.stats().await?;
        let registry_stats = self.registry.stats().await?;

        let mut mismatches = 0;
        for channel in self.registry.channels_with_posts().await? {
            let posts = self.registry.posts_in_channel(&channel).await?;
            let records = self.ledger.find_by_channel(&channel).await?;
            for (post_id, shown, live) in count_mismatches(&posts, &records) {
                warn!(
                    post_id = %post_id,
                    channel = %channel,
                    shown,
                    live,
                    "Vote count disagrees with ledger"
                );
                mismatches += 1;
            }
        }

        let snapshot = StatsSnapshot {
            channels: registry_stats.channels,
            posts: registry_stats.posts,
            votes: ledger_stats.votes,
            unique_voters: ledger_stats.unique_voters,
            count_mismatches: mismatches,
            taken_at: Utc::now(),
        };

        info!(
            channels = snapshot.channels,
            posts = snapshot.posts,
            votes = snapshot.votes,
            unique_voters = snapshot.unique_voters,
            count_mismatches = snapshot.count_mismatches,
            "Maintenance snapshot"
        );

        self.log
            .publish(&format!(
                "Statistics: {} channel(s), {} post(s), {} vote(s) from {} voter(s), {} count mismatch(es)",
                snapshot.channels,
                snapshot.posts,
                snapshot.votes,
                snapshot.unique_voters,
                snapshot.count_mismatches
            ))
            .await;

        if let Some(hook) = &self.snapshot_hook {
            hook(&snapshot);
        }

        Ok(snapshot)
    }
}

fn timer(period: Duration) -> tokio::time::Interval {
    let start = tokio::time::Instant::now() + period;
    let mut interval = interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

#[async_trait]
impl<L, R, O, B, G> ReconciliationApi for ReconciliationSweeper<L, R, O, B, G>
where
    L: VoteLedger + 'static,
    R: ParticipantRegistry + 'static,
    O: MembershipOracle + 'static,
    B: ButtonRefresh + 'static,
    G: OperationalLog + 'static,
{
    async fn run_reconciliation_sweep(&self) -> SweepReport {
        self.sweep_pass().await
    }

    async fn run_maintenance(&self) -> VoteResult<StatsSnapshot> {
        self.maintenance_pass().await
    }

    fn status(&self) -> SweeperStatus {
        self.status.read().clone()
    }
}
