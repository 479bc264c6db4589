//! # vote-integrity
//!
//! Vote integrity core for channel vote polls.
//!
//! ## Overview
//!
//! This crate provides:
//! - **Duplicate-vote prevention**: one vote per voter per participant post,
//!   enforced by an atomic conditional insert
//! - **Vote counts**: per-post counts that equal the live ledger records at
//!   quiescence, clamped at zero
//! - **Reconciliation**: a periodic sweep retracting votes of voters who left
//!   a required channel
//!
//! ## Architecture
//!
//! ```text
//! vote click ──→ VoteProcessor ──→ VoteLedger + ParticipantRegistry
//!                     │                         ↑
//!                     └── RefreshQueue ──→ RefreshWorker ──→ edit button
//!                                               ↑
//! timer ──→ ReconciliationSweeper ──→ MembershipOracle
//!                     │
//!                     └── retract: decrement, refresh, delete
//! ```
//!
//! ## Failure Policy
//!
//! | Failure | Interactive vote | Sweep |
//! |---------|------------------|-------|
//! | Membership lookup error | rejected as not subscribed | voter deferred |
//! | Button edit error | logged, vote kept | logged, retraction kept |
//! | Count update error | record deleted again, error returned | vote kept for next pass |
//!
//! ## Example
//!
//! ```rust,ignore
//! use vote_integrity::{VoteProcessor, VoteConfig};
//! use vote_integrity::ports::inbound::VoteApi;
//!
//! let processor = VoteProcessor::new(ledger, registry, oracle, refresh, VoteConfig::default());
//! let outcome = processor.cast_vote(voter, &channel, &post_id).await?;
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod participation;
pub mod ports;
pub mod processor;
pub mod sweeper;

pub use config::VoteConfig;
pub use domain::{
    ChannelId, MembershipStatus, MessageRef, ParticipantPost, ParticipantProfile, PostId,
    RejectReason, StatsSnapshot, SweepReport, SweeperStatus, UserId, VoteAction, VoteButton,
    VoteOutcome, VoteRecord,
};
pub use error::{EditError, LookupError, SendError, StoreError, VoteError, VoteResult};
pub use participation::ParticipationService;
pub use processor::VoteProcessor;
pub use sweeper::ReconciliationSweeper;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
