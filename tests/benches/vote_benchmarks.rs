//! # Channel Vote Benchmarks
//!
//! | Path | Target |
//! |------|--------|
//! | `cast_vote` accepted (in-memory tables) | < 50µs |
//! | `cast_vote` duplicate rejection | < 20µs |
//! | Reconciliation sweep, 1k voters | < 50ms |

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tokio::runtime::Runtime;

use vote_integrity::adapters::testing::{MemoryLog, RecordingRefresh, ScriptedOracle};
use vote_integrity::adapters::{InMemoryParticipantRegistry, InMemoryVoteLedger};
use vote_integrity::ports::inbound::{ReconciliationApi, VoteApi};
use vote_integrity::ports::outbound::ParticipantRegistry;
use vote_integrity::{ChannelId, ReconciliationSweeper, UserId, VoteConfig, VoteProcessor};

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

fn bench_cast_vote(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("cast-vote");
    group.measurement_time(Duration::from_secs(5));

    let channel = ChannelId::new("@bench").expect("channel");
    let registry = Arc::new(InMemoryParticipantRegistry::new());
    let processor = VoteProcessor::new(
        Arc::new(InMemoryVoteLedger::new()),
        Arc::clone(&registry),
        Arc::new(ScriptedOracle::new()),
        Arc::new(RecordingRefresh::new()),
        VoteConfig::default(),
    );
    let post = rt
        .block_on(registry.create_post(&channel, UserId(1)))
        .expect("post");

    let mut next_voter = 1_000u64;
    group.bench_function("accepted", |b| {
        b.iter(|| {
            next_voter += 1;
            let outcome = rt.block_on(processor.cast_vote(UserId(next_voter), &channel, &post.post_id));
            black_box(outcome.is_ok())
        })
    });

    rt.block_on(processor.cast_vote(UserId(7), &channel, &post.post_id))
        .expect("first vote");
    group.bench_function("duplicate", |b| {
        b.iter(|| {
            let outcome = rt.block_on(processor.cast_vote(UserId(7), &channel, &post.post_id));
            black_box(outcome.is_ok())
        })
    });

    group.finish();
}

fn bench_sweep(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("reconciliation-sweep");
    group.measurement_time(Duration::from_secs(10));

    for voters in [100u64, 1_000] {
        let channel = ChannelId::new("@bench").expect("channel");
        let ledger = Arc::new(InMemoryVoteLedger::new());
        let registry = Arc::new(InMemoryParticipantRegistry::new());
        let oracle = Arc::new(ScriptedOracle::new());
        let refresh = Arc::new(RecordingRefresh::new());
        let config = VoteConfig::default();

        let processor = VoteProcessor::new(
            Arc::clone(&ledger),
            Arc::clone(&registry),
            Arc::clone(&oracle),
            Arc::clone(&refresh),
            config.clone(),
        );
        let sweeper = ReconciliationSweeper::new(
            ledger,
            Arc::clone(&registry),
            oracle,
            refresh,
            Arc::new(MemoryLog::new()),
            config,
        );

        rt.block_on(async {
            let post = registry.create_post(&channel, UserId(1)).await.expect("post");
            for voter in 0..voters {
                processor
                    .cast_vote(UserId(10 + voter), &channel, &post.post_id)
                    .await
                    .expect("vote");
            }
        });

        // Everyone still qualifies, so each pass scans without retracting
        group.throughput(Throughput::Elements(voters));
        group.bench_with_input(BenchmarkId::new("all_qualifying", voters), &voters, |b, _| {
            b.iter(|| black_box(rt.block_on(sweeper.run_reconciliation_sweep())))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_cast_vote, bench_sweep);
criterion_main!(benches);
