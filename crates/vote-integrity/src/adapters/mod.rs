//! # Adapters Module
//!
//! Implementations of the outbound ports.
//!
//! ## Modules
//!
//! - `memory`: in-memory vote ledger and participant registry
//! - `membership`: membership oracle over the messaging platform
//! - `refresh`: fire-and-forget button refresh queue and its worker
//! - `rocksdb_store`: persistent store (feature `rocksdb`)
//! - `testing`: scripted test doubles

pub mod membership;
pub mod memory;
pub mod refresh;
pub mod testing;

#[cfg(feature = "rocksdb")]
pub mod rocksdb_store;

pub use membership::PlatformMembershipOracle;
pub use memory::{InMemoryParticipantRegistry, InMemoryVoteLedger};
pub use refresh::{refresh_channel, RefreshQueue, RefreshStats, RefreshWorker};

#[cfg(feature = "rocksdb")]
pub use rocksdb_store::{RocksDbConfig, RocksDbVoteStore};
