//! # Channel Vote Test Suite
//!
//! Unified test crate exercising the vote-integrity core end to end with the
//! in-memory tables and scripted platform doubles.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/
//! │   ├── voting.rs           # cast_vote under concurrency
//! │   └── reconciliation.rs   # sweeps, refresh worker, count audits
//! └── benches/
//!     └── vote_benchmarks.rs  # vote path and sweep throughput
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p vote-tests
//! cargo test -p vote-tests integration::reconciliation
//! cargo bench -p vote-tests
//! ```

pub mod integration;
