//! Resolving shard addresses into block-store handles.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::StoreError;
use crate::traits::BlockStore;

/// Opens a [`BlockStore`] handle for a shard address from the directory.
pub trait BlockStoreConnector: Send + Sync {
    fn connect(&self, addr: &str) -> Result<Arc<dyn BlockStore>, StoreError>;
}

/// Connector over a fixed address -> store table.
///
/// Used when the shards live in the same process as the client.
#[derive(Default, Clone)]
pub struct StaticConnector {
    shards: HashMap<String, Arc<dyn BlockStore>>,
}

impl StaticConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a store under `addr`
    pub fn with_shard(mut self, addr: impl Into<String>, store: Arc<dyn BlockStore>) -> Self {
        self.shards.insert(addr.into(), store);
        self
    }
}

impl BlockStoreConnector for StaticConnector {
    fn connect(&self, addr: &str) -> Result<Arc<dyn BlockStore>, StoreError> {
        self.shards
            .get(addr)
            .cloned()
            .ok_or_else(|| StoreError::UnknownShard(addr.to_string()))
    }
}
