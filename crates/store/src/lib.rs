//! Block and metadata storage services.
//!
//! This crate defines the [`BlockStore`] and [`MetaStore`] service traits,
//! along with:
//!
//! - [`MemoryBlockStore`] / [`MemoryMetaStore`]: volatile in-memory services.
//! - [`ShardedBlockStore`]: routes each digest to one shard via the hash ring.
//! - [`BlockStoreConnector`]: resolves shard addresses into store handles.

mod connector;
mod error;
mod memory;
mod sharded;
mod traits;

pub use connector::{BlockStoreConnector, StaticConnector};
pub use error::StoreError;
pub use memory::{MemoryBlockStore, MemoryMetaStore};
pub use sharded::ShardedBlockStore;
pub use traits::{BlockStore, MetaStore, UPDATE_REJECTED};
