//! Prometheus metrics for the vote bot.
//!
//! All metrics follow the naming convention: `vote_<area>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: monotonically increasing value (e.g. vote_sweep_runs_total)
//! - **Gauge**: value that can go up or down (e.g. vote_ledger_records)
//! - **Histogram**: distribution of values (e.g. vote_sweep_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // VOTING
    // =========================================================================

    /// Vote attempts by outcome
    pub static ref VOTE_CASTS: CounterVec = CounterVec::new(
        Opts::new("vote_casts_total", "Vote attempts by outcome"),
        &["outcome"]  // accepted/not_subscribed/duplicate/invalid_target/error
    ).expect("metric creation failed");

    /// Participant cards posted
    pub static ref PARTICIPATIONS: CounterVec = CounterVec::new(
        Opts::new("vote_participations_total", "Participation requests by outcome"),
        &["outcome"]  // posted/failed
    ).expect("metric creation failed");

    /// Failed vote button refreshes
    pub static ref BUTTON_REFRESH_FAILURES: Counter = Counter::new(
        "vote_button_refresh_failures_total",
        "Vote button edits that failed"
    ).expect("metric creation failed");

    // =========================================================================
    // RECONCILIATION
    // =========================================================================

    /// Completed sweep passes
    pub static ref SWEEP_RUNS: Counter = Counter::new(
        "vote_sweep_runs_total",
        "Completed reconciliation sweeps"
    ).expect("metric creation failed");

    /// Votes retracted by sweeps
    pub static ref SWEEP_RETRACTIONS: Counter = Counter::new(
        "vote_sweep_retractions_total",
        "Votes retracted because the voter left a required channel"
    ).expect("metric creation failed");

    /// Voters deferred because a membership lookup failed
    pub static ref SWEEP_DEFERRED_VOTERS: Counter = Counter::new(
        "vote_sweep_deferred_voters_total",
        "Voters skipped by a sweep after a membership lookup error"
    ).expect("metric creation failed");

    /// Sweep duration
    pub static ref SWEEP_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "vote_sweep_duration_seconds",
            "Time spent in one reconciliation sweep"
        ).buckets(exponential_buckets(0.01, 2.0, 14).expect("valid buckets"))
    ).expect("metric creation failed");

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    /// Live vote records at the last snapshot
    pub static ref LEDGER_RECORDS: Gauge = Gauge::new(
        "vote_ledger_records",
        "Live vote records at the last maintenance snapshot"
    ).expect("metric creation failed");

    /// Posts whose count disagreed with the ledger at the last snapshot
    pub static ref COUNT_MISMATCHES: Gauge = Gauge::new(
        "vote_count_mismatches",
        "Posts whose count disagreed with the ledger at the last snapshot"
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry. Safe to call repeatedly.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Voting
        Box::new(VOTE_CASTS.clone()),
        Box::new(PARTICIPATIONS.clone()),
        Box::new(BUTTON_REFRESH_FAILURES.clone()),
        // Reconciliation
        Box::new(SWEEP_RUNS.clone()),
        Box::new(SWEEP_RETRACTIONS.clone()),
        Box::new(SWEEP_DEFERRED_VOTERS.clone()),
        Box::new(SWEEP_DURATION.clone()),
        // Maintenance
        Box::new(LEDGER_RECORDS.clone()),
        Box::new(COUNT_MISMATCHES.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
