//! Block store that routes every digest to one shard on the hash ring.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::try_join_all;
use surf_core::{Block, Digest, Ring};
use tracing::debug;

use crate::connector::BlockStoreConnector;
use crate::error::StoreError;
use crate::traits::BlockStore;

/// A set of block-store shards addressed through a consistent hash ring.
pub struct ShardedBlockStore {
    ring: Ring,
    shards: HashMap<String, Arc<dyn BlockStore>>,
}

impl ShardedBlockStore {
    /// Build from a shard directory, opening each shard with `connector`
    pub fn from_directory(
        addrs: &[String],
        connector: &dyn BlockStoreConnector,
    ) -> Result<Self, StoreError> {
        if addrs.is_empty() {
            return Err(StoreError::NoShards);
        }

        let mut shards = HashMap::with_capacity(addrs.len());
        for addr in addrs {
            shards.insert(addr.clone(), connector.connect(addr)?);
        }
        debug!(shards = shards.len(), "opened block-store shards");

        Ok(Self {
            ring: Ring::new(addrs.iter().cloned()),
            shards,
        })
    }

    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    fn shard_for(&self, digest: &Digest) -> Result<(&str, &Arc<dyn BlockStore>), StoreError> {
        let addr = self.ring.responsible_shard(digest).ok_or(StoreError::NoShards)?;
        let store = self
            .shards
            .get(addr)
            .ok_or_else(|| StoreError::UnknownShard(addr.to_string()))?;
        Ok((addr, store))
    }
}

#[async_trait::async_trait]
impl BlockStore for ShardedBlockStore {
    async fn get_block(&self, digest: &Digest) -> Result<Block, StoreError> {
        let (addr, store) = self.shard_for(digest)?;
        debug!(%digest, shard = addr, "fetching block");
        store.get_block(digest).await
    }

    async fn put_block(&self, block: Block) -> Result<bool, StoreError> {
        let digest = block.digest();
        let (addr, store) = self.shard_for(&digest)?;
        debug!(%digest, shard = addr, size = block.len(), "storing block");
        store.put_block(block).await
    }

    async fn has_blocks(&self, digests: &[Digest]) -> Result<Vec<Digest>, StoreError> {
        let groups = self.ring.assignments(digests);

        let mut queries = Vec::with_capacity(groups.len());
        for (addr, group) in &groups {
            let store = self
                .shards
                .get(addr)
                .ok_or_else(|| StoreError::UnknownShard(addr.clone()))?;
            queries.push(store.has_blocks(group));
        }

        let present: HashSet<Digest> = try_join_all(queries).await?.into_iter().flatten().collect();
        Ok(digests.iter().filter(|d| present.contains(*d)).copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::StaticConnector;
    use crate::memory::MemoryBlockStore;

    fn three_shards() -> (Vec<Arc<MemoryBlockStore>>, ShardedBlockStore) {
        let stores: Vec<Arc<MemoryBlockStore>> =
            (0..3).map(|_| Arc::new(MemoryBlockStore::new())).collect();
        let addrs: Vec<String> = (0..3).map(|i| format!("blockstore{i}")).collect();
        let mut connector = StaticConnector::new();
        for (addr, store) in addrs.iter().zip(&stores) {
            connector = connector.with_shard(addr.clone(), store.clone());
        }
        let sharded = ShardedBlockStore::from_directory(&addrs, &connector).unwrap();
        (stores, sharded)
    }

    #[tokio::test]
    async fn test_blocks_land_on_responsible_shard_only() {
        let (stores, sharded) = three_shards();
        let blocks: Vec<Block> = (0..60u32).map(|i| Block::new(i.to_le_bytes().to_vec())).collect();

        for block in &blocks {
            sharded.put_block(block.clone()).await.unwrap();
        }

        for block in &blocks {
            let digest = block.digest();
            let owner = sharded.ring().responsible_shard(&digest).unwrap();
            let idx: usize = owner.trim_start_matches("blockstore").parse().unwrap();
            for (i, store) in stores.iter().enumerate() {
                assert_eq!(store.contains(&digest), i == idx);
            }
            assert_eq!(sharded.get_block(&digest).await.unwrap(), *block);
        }
        let total: usize = stores.iter().map(|s| s.len()).sum();
        assert_eq!(total, blocks.len());
    }

    #[tokio::test]
    async fn test_has_blocks_merges_in_input_order() {
        let (_stores, sharded) = three_shards();
        let kept: Vec<Block> = (0..20u32).map(|i| Block::new(format!("kept-{i}").into_bytes())).collect();
        for block in &kept {
            sharded.put_block(block.clone()).await.unwrap();
        }

        let mut query = Vec::new();
        for (i, block) in kept.iter().enumerate() {
            query.push(surf_core::hash_bytes(format!("absent-{i}").as_bytes()));
            query.push(block.digest());
        }
        let expected: Vec<Digest> = kept.iter().map(Block::digest).collect();
        assert_eq!(sharded.has_blocks(&query).await.unwrap(), expected);
    }

    #[test]
    fn test_empty_directory_rejected() {
        let connector = StaticConnector::new();
        assert!(matches!(
            ShardedBlockStore::from_directory(&[], &connector),
            Err(StoreError::NoShards)
        ));
    }

    #[test]
    fn test_unknown_shard_rejected() {
        let connector = StaticConnector::new();
        let addrs = vec!["nowhere".to_string()];
        assert!(matches!(
            ShardedBlockStore::from_directory(&addrs, &connector),
            Err(StoreError::UnknownShard(_))
        ));
    }
}
