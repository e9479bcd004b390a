//! Service traits for block and metadata storage.

use surf_core::{Block, Digest, FileInfoMap, FileRecord};

use crate::error::StoreError;

/// Version returned by [`MetaStore::update_file`] when the update lost the race
pub const UPDATE_REJECTED: i64 = -1;

/// Content-addressed block storage: digest -> block bytes.
///
/// Implementations must be `Send + Sync` for use across async tasks.
#[async_trait::async_trait]
pub trait BlockStore: Send + Sync {
    /// Fetch a block by digest. Fails with [`StoreError::NotFound`] if absent.
    async fn get_block(&self, digest: &Digest) -> Result<Block, StoreError>;

    /// Store a block under its own digest. Idempotent.
    async fn put_block(&self, block: Block) -> Result<bool, StoreError>;

    /// Return the subset of `digests` this store holds, in input order.
    async fn has_blocks(&self, digests: &[Digest]) -> Result<Vec<Digest>, StoreError>;
}

/// Authoritative filename -> versioned record mapping.
#[async_trait::async_trait]
pub trait MetaStore: Send + Sync {
    /// Point-in-time copy of every record.
    async fn get_file_info_map(&self) -> Result<FileInfoMap, StoreError>;

    /// Compare-and-swap on the record's version.
    ///
    /// Accepted iff `record.version` is exactly one past the stored version
    /// (or the file is new and `record.version == 1`). Returns the accepted
    /// version, or [`UPDATE_REJECTED`] with state unchanged.
    async fn update_file(&self, record: FileRecord) -> Result<i64, StoreError>;

    /// Addresses of the block-store shards currently in the ring.
    async fn get_block_store_addrs(&self) -> Result<Vec<String>, StoreError>;
}
