//! In-memory block and metadata services.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use surf_core::{Block, Digest, FileInfoMap, FileRecord};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::traits::{BlockStore, MetaStore, UPDATE_REJECTED};

/// Volatile block store backed by a `DashMap`.
///
/// Counts calls so tests can assert that a pass performed no writes.
#[derive(Default)]
pub struct MemoryBlockStore {
    blocks: DashMap<Digest, Bytes>,
    puts: AtomicU64,
    gets: AtomicU64,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blocks held
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.blocks.contains_key(digest)
    }

    /// Total `put_block` calls served
    pub fn put_count(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    /// Total `get_block` calls served
    pub fn get_count(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl BlockStore for MemoryBlockStore {
    async fn get_block(&self, digest: &Digest) -> Result<Block, StoreError> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        self.blocks
            .get(digest)
            .map(|data| Block::new(data.value().clone()))
            .ok_or(StoreError::NotFound(*digest))
    }

    async fn put_block(&self, block: Block) -> Result<bool, StoreError> {
        self.puts.fetch_add(1, Ordering::Relaxed);
        let digest = block.digest();
        debug!(%digest, size = block.len(), "storing block in memory");
        self.blocks.insert(digest, block.data);
        Ok(true)
    }

    async fn has_blocks(&self, digests: &[Digest]) -> Result<Vec<Digest>, StoreError> {
        Ok(digests
            .iter()
            .filter(|d| self.blocks.contains_key(*d))
            .copied()
            .collect())
    }
}

/// Volatile metadata store.
///
/// Each filename lives in one `DashMap` entry; the version check and the
/// write happen while that entry's shard lock is held, so two concurrent
/// updates of the same filename cannot both be accepted.
pub struct MemoryMetaStore {
    files: DashMap<String, FileRecord>,
    block_store_addrs: RwLock<Vec<String>>,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl MemoryMetaStore {
    /// Create a metadata store advertising the given block-store shards
    pub fn new<I, S>(block_store_addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            files: DashMap::new(),
            block_store_addrs: RwLock::new(block_store_addrs.into_iter().map(Into::into).collect()),
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Replace the advertised shard directory
    pub fn set_block_store_addrs(&self, addrs: Vec<String>) {
        info!(shards = addrs.len(), "updated block-store directory");
        *self.block_store_addrs.write() = addrs;
    }

    /// Current version of a file, if known
    pub fn version_of(&self, filename: &str) -> Option<i64> {
        self.files.get(filename).map(|r| r.version)
    }

    /// Total accepted `update_file` calls
    pub fn accepted_updates(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Total rejected `update_file` calls
    pub fn rejected_updates(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    fn accept(&self, record: &FileRecord) -> i64 {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        info!(
            filename = %record.filename,
            version = record.version,
            tombstone = record.is_tombstone(),
            "accepted file update"
        );
        record.version
    }

    fn reject(&self, record: &FileRecord, current: Option<i64>) -> i64 {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        warn!(
            filename = %record.filename,
            offered = record.version,
            current = ?current,
            "rejected stale file update"
        );
        UPDATE_REJECTED
    }
}

#[async_trait::async_trait]
impl MetaStore for MemoryMetaStore {
    async fn get_file_info_map(&self) -> Result<FileInfoMap, StoreError> {
        Ok(self
            .files
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }

    async fn update_file(&self, record: FileRecord) -> Result<i64, StoreError> {
        match self.files.entry(record.filename.clone()) {
            Entry::Occupied(mut slot) => {
                let current = slot.get().version;
                if record.version == current + 1 {
                    let version = self.accept(&record);
                    slot.insert(record);
                    Ok(version)
                } else {
                    Ok(self.reject(&record, Some(current)))
                }
            }
            Entry::Vacant(slot) => {
                if record.version == 1 {
                    let version = self.accept(&record);
                    slot.insert(record);
                    Ok(version)
                } else {
                    Ok(self.reject(&record, None))
                }
            }
        }
    }

    async fn get_block_store_addrs(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.block_store_addrs.read().clone())
    }
}
