//! # RocksDB Vote Store
//!
//! Persistent implementation of both tables in one database.
//!
//! ## Column Families
//!
//! - `vote_records` - key `<channel>\0<voter:020>\0<post_id>`, so every
//!   record of a channel is one prefix scan
//! - `participant_posts` - key `<post_id>`
//!
//! Values are bincode-encoded. RocksDB has no conditional put, so the
//! conditional insert and the count updates take a striped mutex keyed by
//! post id; that is the per-post serialization point.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashSet};
use std::hash::{Hash, Hasher};
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rocksdb::{
    BlockBasedOptions, Cache, ColumnFamily, ColumnFamilyDescriptor, DBCompressionType, Direction,
    IteratorMode, Options, WriteBatch, WriteOptions, DB,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{
    ChannelId, CountDelta, CountUpdate, InsertOutcome, LedgerStats, MessageRef, ParticipantPost,
    PostId, PostIdGenerator, RegistryStats, UserId, VoteRecord,
};
use crate::error::StoreError;
use crate::ports::outbound::{ParticipantRegistry, VoteLedger};

pub const CF_VOTE_RECORDS: &str = "vote_records";
pub const CF_PARTICIPANT_POSTS: &str = "participant_posts";

pub const COLUMN_FAMILIES: &[&str] = &[CF_VOTE_RECORDS, CF_PARTICIPANT_POSTS];

const LOCK_STRIPES: usize = 64;

/// RocksDB configuration
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Path to the database directory
    pub path: String,
    /// Block cache size in bytes (default: 32MB)
    pub block_cache_size: usize,
    /// Write buffer size in bytes (default: 16MB)
    pub write_buffer_size: usize,
    /// fsync after each write (default: true)
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "./data/votes".to_string(),
            block_cache_size: 32 * 1024 * 1024,
            write_buffer_size: 16 * 1024 * 1024,
            sync_writes: true,
        }
    }
}

impl RocksDbConfig {
    /// Create config for testing (small buffers, no sync)
    pub fn for_testing(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_string_lossy().to_string(),
            block_cache_size: 4 * 1024 * 1024,
            write_buffer_size: 1024 * 1024,
            sync_writes: false,
        }
    }
}

/// Vote ledger and participant registry backed by RocksDB.
pub struct RocksDbVoteStore {
    db: DB,
    config: RocksDbConfig,
    stripes: Vec<Mutex<()>>,
    ids: PostIdGenerator,
}

impl RocksDbVoteStore {
    /// Open or create the database.
    pub fn open(config: RocksDbConfig) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(DBCompressionType::Snappy);

        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(DBCompressionType::Snappy);
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&opts, &config.path, cf_descriptors)
            .map_err(|e| backend("open", e))?;

        info!(path = %config.path, "Opened vote store");

        Ok(Self {
            db,
            config,
            stripes: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
            ids: PostIdGenerator::new(),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StoreError> {
        self.db.cf_handle(name).ok_or_else(|| StoreError::Backend {
            reason: format!("missing column family {name}"),
        })
    }

    fn stripe(&self, post: &PostId) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        post.hash(&mut hasher);
        &self.stripes[(hasher.finish() as usize) % self.stripes.len()]
    }

    fn write_opts(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.config.sync_writes);
        opts
    }

    fn get_value<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>, StoreError> {
        let handle = self.cf(cf)?;
        match self.db.get_cf(handle, key).map_err(|e| backend("get", e))? {
            Some(bytes) => decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn put_value<T: Serialize>(&self, cf: &str, key: &[u8], value: &T) -> Result<(), StoreError> {
        let handle = self.cf(cf)?;
        self.db
            .put_cf_opt(handle, key, encode(value)?, &self.write_opts())
            .map_err(|e| backend("put", e))
    }

    fn scan<T: DeserializeOwned>(&self, cf: &str, prefix: &[u8]) -> Result<Vec<T>, StoreError> {
        let handle = self.cf(cf)?;
        let mut results = Vec::new();

        let iter = self
            .db
            .iterator_cf(handle, IteratorMode::From(prefix, Direction::Forward));

        for item in iter {
            let (key, value) = item.map_err(|e| backend("scan", e))?;
            if !key.starts_with(prefix) {
                break;
            }
            results.push(decode(&value)?);
        }

        Ok(results)
    }

    fn all_posts(&self) -> Result<Vec<ParticipantPost>, StoreError> {
        self.scan(CF_PARTICIPANT_POSTS, b"")
    }
}

fn record_prefix(channel: &ChannelId) -> Vec<u8> {
    format!("{channel}\0").into_bytes()
}

fn record_key(voter: UserId, channel: &ChannelId, post: &PostId) -> Vec<u8> {
    format!("{channel}\0{:020}\0{post}", voter.0).into_bytes()
}

fn post_key(post: &PostId) -> Vec<u8> {
    post.to_string().into_bytes()
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    bincode::serialize(value).map_err(|e| StoreError::Serialization {
        reason: e.to_string(),
    })
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization {
        reason: e.to_string(),
    })
}

fn backend(operation: &str, err: rocksdb::Error) -> StoreError {
    StoreError::Backend {
        reason: format!("RocksDB {operation} failed: {err}"),
    }
}

#[async_trait]
impl VoteLedger for RocksDbVoteStore {
    async fn insert_if_absent(&self, record: VoteRecord) -> Result<InsertOutcome, StoreError> {
        let key = record_key(record.voter_id, &record.channel_id, &record.post_id);
        let _guard = self.stripe(&record.post_id).lock();

        let handle = self.cf(CF_VOTE_RECORDS)?;
        let exists = self
            .db
            .get_pinned_cf(handle, &key)
            .map_err(|e| backend("get", e))?
            .is_some();
        if exists {
            return Ok(InsertOutcome::AlreadyExists);
        }

        self.put_value(CF_VOTE_RECORDS, &key, &record)?;
        Ok(InsertOutcome::Inserted)
    }

    async fn find(
        &self,
        voter: UserId,
        channel: &ChannelId,
        post: &PostId,
    ) -> Result<Option<VoteRecord>, StoreError> {
        self.get_value(CF_VOTE_RECORDS, &record_key(voter, channel, post))
    }

    async fn find_by_channel(&self, channel: &ChannelId) -> Result<Vec<VoteRecord>, StoreError> {
        self.scan(CF_VOTE_RECORDS, &record_prefix(channel))
    }

    async fn delete_one(
        &self,
        voter: UserId,
        channel: &ChannelId,
        post: &PostId,
    ) -> Result<bool, StoreError> {
        let key = record_key(voter, channel, post);
        let _guard = self.stripe(post).lock();

        let handle = self.cf(CF_VOTE_RECORDS)?;
        let existed = self
            .db
            .get_pinned_cf(handle, &key)
            .map_err(|e| backend("get", e))?
            .is_some();
        if existed {
            self.db
                .delete_cf_opt(handle, &key, &self.write_opts())
                .map_err(|e| backend("delete", e))?;
        }
        Ok(existed)
    }

    async fn delete_voter_records(
        &self,
        voter: UserId,
        channel: &ChannelId,
        posts: &[PostId],
    ) -> Result<usize, StoreError> {
        let handle = self.cf(CF_VOTE_RECORDS)?;
        let mut batch = WriteBatch::default();
        let mut removed = 0;

        for post in posts {
            let key = record_key(voter, channel, post);
            let exists = self
                .db
                .get_pinned_cf(handle, &key)
                .map_err(|e| backend("get", e))?
                .is_some();
            if exists {
                batch.delete_cf(handle, &key);
                removed += 1;
            }
        }

        if removed > 0 {
            self.db
                .write_opt(batch, &self.write_opts())
                .map_err(|e| backend("batch write", e))?;
        }
        Ok(removed)
    }

    async fn stats(&self) -> Result<LedgerStats, StoreError> {
        let records: Vec<VoteRecord> = self.scan(CF_VOTE_RECORDS, b"")?;
        let voters: HashSet<UserId> = records.iter().map(|r| r.voter_id).collect();
        Ok(LedgerStats {
            votes: records.len(),
            unique_voters: voters.len(),
        })
    }
}

#[async_trait]
impl ParticipantRegistry for RocksDbVoteStore {
    async fn create_post(
        &self,
        channel: &ChannelId,
        participant: UserId,
    ) -> Result<ParticipantPost, StoreError> {
        let post = ParticipantPost::new(self.ids.next(participant), channel.clone(), Utc::now());
        let key = post_key(&post.post_id);
        let _guard = self.stripe(&post.post_id).lock();

        if self
            .get_value::<ParticipantPost>(CF_PARTICIPANT_POSTS, &key)?
            .is_some()
        {
            return Err(StoreError::PostExists {
                post_id: post.post_id,
            });
        }

        self.put_value(CF_PARTICIPANT_POSTS, &key, &post)?;
        Ok(post)
    }

    async fn get_post(
        &self,
        channel: &ChannelId,
        post: &PostId,
    ) -> Result<Option<ParticipantPost>, StoreError> {
        let found: Option<ParticipantPost> =
            self.get_value(CF_PARTICIPANT_POSTS, &post_key(post))?;
        Ok(found.filter(|p| &p.channel_id == channel))
    }

    async fn increment_count(
        &self,
        post: &PostId,
        delta: CountDelta,
    ) -> Result<CountUpdate, StoreError> {
        let key = post_key(post);
        let _guard = self.stripe(post).lock();

        let mut stored: ParticipantPost = self
            .get_value(CF_PARTICIPANT_POSTS, &key)?
            .ok_or_else(|| StoreError::PostNotFound {
                post_id: post.clone(),
            })?;

        let update = CountUpdate::apply(stored.vote_count, delta);
        if update.clamped {
            warn!(post_id = %post, "Decrement on a post already at zero votes; clamped");
        }
        stored.vote_count = update.new_count;
        self.put_value(CF_PARTICIPANT_POSTS, &key, &stored)?;
        Ok(update)
    }

    async fn attach_message_ref(
        &self,
        post: &PostId,
        message_ref: MessageRef,
    ) -> Result<(), StoreError> {
        let key = post_key(post);
        let _guard = self.stripe(post).lock();

        let mut stored: ParticipantPost = self
            .get_value(CF_PARTICIPANT_POSTS, &key)?
            .ok_or_else(|| StoreError::PostNotFound {
                post_id: post.clone(),
            })?;
        stored.channel_message_ref = Some(message_ref);
        self.put_value(CF_PARTICIPANT_POSTS, &key, &stored)
    }

    async fn channels_with_posts(&self) -> Result<Vec<ChannelId>, StoreError> {
        let channels: BTreeSet<ChannelId> = self
            .all_posts()?
            .into_iter()
            .map(|post| post.channel_id)
            .collect();
        Ok(channels.into_iter().collect())
    }

    async fn posts_in_channel(
        &self,
        channel: &ChannelId,
    ) -> Result<Vec<ParticipantPost>, StoreError> {
        Ok(self
            .all_posts()?
            .into_iter()
            .filter(|post| &post.channel_id == channel)
            .collect())
    }

    async fn stats(&self) -> Result<RegistryStats, StoreError> {
        let posts = self.all_posts()?;
        let channels: HashSet<&ChannelId> = posts.iter().map(|post| &post.channel_id).collect();
        Ok(RegistryStats {
            posts: posts.len(),
            channels: channels.len(),
        })
    }
}
