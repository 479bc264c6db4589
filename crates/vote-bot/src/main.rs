//! # Channel Vote Bot
//!
//! Entry point: wires the vote-integrity core to Telegram and runs the
//! dispatcher, the button refresh worker and the reconciliation sweeper
//! until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::prelude::*;
use tokio::sync::watch;
use tracing::{error, info};

use vote_bot::{metrics_server, schema, AppState, BotConfig, TelegramLog, TelegramPlatform};
use vote_integrity::adapters::{refresh_channel, PlatformMembershipOracle};
use vote_integrity::ports::outbound::{ParticipantRegistry, VoteLedger};
use vote_integrity::{
    ParticipationService, ReconciliationSweeper, StatsSnapshot, SweepReport, VoteProcessor,
};
use vote_telemetry::{
    init_telemetry, TelemetryConfig, COUNT_MISMATCHES, LEDGER_RECORDS, SWEEP_DEFERRED_VOTERS,
    SWEEP_DURATION, SWEEP_RETRACTIONS, SWEEP_RUNS,
};

#[cfg(not(feature = "rocksdb"))]
use vote_integrity::adapters::{InMemoryParticipantRegistry, InMemoryVoteLedger};
#[cfg(feature = "rocksdb")]
use vote_integrity::adapters::{RocksDbConfig, RocksDbVoteStore};

#[cfg(not(feature = "rocksdb"))]
fn open_stores(
    _config: &BotConfig,
) -> Result<(Arc<InMemoryVoteLedger>, Arc<InMemoryParticipantRegistry>)> {
    info!("Using in-memory vote tables; votes are lost on restart");
    Ok((
        Arc::new(InMemoryVoteLedger::new()),
        Arc::new(InMemoryParticipantRegistry::new()),
    ))
}

#[cfg(feature = "rocksdb")]
fn open_stores(config: &BotConfig) -> Result<(Arc<RocksDbVoteStore>, Arc<RocksDbVoteStore>)> {
    let db_config = RocksDbConfig {
        path: config.data_dir.to_string_lossy().to_string(),
        ..RocksDbConfig::default()
    };
    let store = RocksDbVoteStore::open(db_config)
        .with_context(|| format!("failed to open vote store at {}", config.data_dir.display()))?;
    info!(path = %config.data_dir.display(), "Opened RocksDB vote tables");

    let store = Arc::new(store);
    Ok((Arc::clone(&store), store))
}

fn record_sweep_metrics(report: &SweepReport) {
    SWEEP_RUNS.inc();
    SWEEP_RETRACTIONS.inc_by(report.votes_retracted as f64);
    SWEEP_DEFERRED_VOTERS.inc_by(report.voters_deferred as f64);
    SWEEP_DURATION.observe(report.duration.as_secs_f64());
}

fn record_snapshot_metrics(snapshot: &StatsSnapshot) {
    LEDGER_RECORDS.set(snapshot.votes as f64);
    COUNT_MISMATCHES.set(snapshot.count_mismatches as f64);
}

async fn run<L, R>(config: BotConfig, ledger: Arc<L>, registry: Arc<R>) -> Result<()>
where
    L: VoteLedger + 'static,
    R: ParticipantRegistry + 'static,
{
    let vote_config = config.vote_config();
    vote_config
        .validate()
        .context("invalid vote configuration")?;

    let bot = Bot::new(&config.bot_token);
    let platform = Arc::new(TelegramPlatform::new(bot.clone()));
    let oracle = Arc::new(PlatformMembershipOracle::new(Arc::clone(&platform)));
    let log = Arc::new(TelegramLog::new(bot.clone(), config.log_channel_id));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Button refreshes are drained by one worker, off the vote path
    let (queue, worker) = refresh_channel(
        Arc::clone(&registry),
        Arc::clone(&platform),
        vote_config.button_emoji.clone(),
    );
    let queue = Arc::new(queue);
    let worker_handle = tokio::spawn(worker.run_until_shutdown(shutdown_rx.clone()));

    let processor = VoteProcessor::new(
        Arc::clone(&ledger),
        Arc::clone(&registry),
        Arc::clone(&oracle),
        Arc::clone(&queue),
        vote_config.clone(),
    );
    let participation = ParticipationService::new(
        Arc::clone(&registry),
        Arc::clone(&platform),
        Arc::clone(&log),
        vote_config.button_emoji.clone(),
    );

    let sweeper = Arc::new(
        ReconciliationSweeper::new(ledger, registry, oracle, queue, log, vote_config)
            .with_report_hook(record_sweep_metrics)
            .with_snapshot_hook(record_snapshot_metrics),
    );
    let sweeper_handle = Arc::clone(&sweeper).spawn(shutdown_rx.clone());

    let metrics_handle = config.metrics_addr.map(|addr| {
        tokio::spawn(async move {
            if let Err(e) = metrics_server::serve(addr, shutdown_rx).await {
                error!(addr = %addr, error = %e, "Metrics server failed");
            }
        })
    });

    let state = Arc::new(AppState::new(Arc::new(processor), Arc::new(participation)));

    info!(
        required_channels = config.required_channels.len(),
        sweep_interval_secs = config.sweep_interval.as_secs(),
        log_channel = config.log_channel_id.is_some(),
        metrics = config.metrics_addr.is_some(),
        "Start polling"
    );

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            let _ = upd;
        })
        .error_handler(LoggingErrorHandler::with_custom_text("Dispatcher error"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Initiating graceful shutdown...");
    if let Err(e) = shutdown_tx.send(true) {
        error!("Failed to send shutdown signal: {}", e);
    }

    sweeper_handle.await.context("sweeper task panicked")?;
    if let Some(handle) = metrics_handle {
        handle.await.context("metrics server panicked")?;
    }
    let stats = worker_handle.await.context("refresh worker panicked")?;
    info!(
        applied = stats.applied,
        skipped = stats.skipped,
        failed = stats.failed,
        "Shutdown complete"
    );

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry(TelemetryConfig::from_env()).context("failed to initialize telemetry")?;

    let config = BotConfig::from_env().context("invalid bot configuration")?;
    let (ledger, registry) = open_stores(&config)?;

    run(config, ledger, registry).await
}
