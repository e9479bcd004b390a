//! Store clients that talk to remote services over TCP

use std::sync::Arc;
use std::time::Duration;

use surf_core::{Block, Digest, FileInfoMap, FileRecord};
use surf_store::{BlockStore, BlockStoreConnector, MetaStore, StoreError};
use tokio::net::TcpStream;
use tracing::debug;

use crate::protocol::{read_frame, write_frame, Request, Response};

/// Deadline applied to every call unless configured otherwise
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(1);

/// Address plus per-call deadline; one connection per call
#[derive(Debug, Clone)]
struct Endpoint {
    addr: String,
    timeout: Duration,
}

impl Endpoint {
    async fn call(&self, request: Request) -> Result<Response, StoreError> {
        let exchange = async {
            let mut stream = TcpStream::connect(&self.addr)
                .await
                .map_err(|e| StoreError::Unavailable {
                    addr: self.addr.clone(),
                    reason: e.to_string(),
                })?;
            stream.set_nodelay(true)?;
            write_frame(&mut stream, &request).await?;
            read_frame::<_, Response>(&mut stream)
                .await?
                .ok_or_else(|| StoreError::Transport(format!("{} closed the connection", self.addr)))
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(Response::Error(message))) => Err(StoreError::Transport(message)),
            Ok(result) => result,
            Err(_) => {
                debug!(addr = %self.addr, timeout = ?self.timeout, "call timed out");
                Err(StoreError::Timeout(self.timeout))
            }
        }
    }
}

fn unexpected(response: Response, wanted: &str) -> StoreError {
    StoreError::Transport(format!("expected {wanted} response, got {}", response.kind()))
}

/// Block service reached over TCP
#[derive(Debug, Clone)]
pub struct RemoteBlockStore {
    endpoint: Endpoint,
}

impl RemoteBlockStore {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            endpoint: Endpoint {
                addr: addr.into(),
                timeout: DEFAULT_RPC_TIMEOUT,
            },
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.endpoint.timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.endpoint.addr
    }
}

#[async_trait::async_trait]
impl BlockStore for RemoteBlockStore {
    async fn get_block(&self, digest: &Digest) -> Result<Block, StoreError> {
        match self.endpoint.call(Request::GetBlock(*digest)).await? {
            Response::Block(block) => Ok(block),
            Response::NotFound(digest) => Err(StoreError::NotFound(digest)),
            other => Err(unexpected(other, "Block")),
        }
    }

    async fn put_block(&self, block: Block) -> Result<bool, StoreError> {
        match self.endpoint.call(Request::PutBlock(block)).await? {
            Response::Stored(ok) => Ok(ok),
            other => Err(unexpected(other, "Stored")),
        }
    }

    async fn has_blocks(&self, digests: &[Digest]) -> Result<Vec<Digest>, StoreError> {
        match self.endpoint.call(Request::HasBlocks(digests.to_vec())).await? {
            Response::Present(present) => Ok(present),
            other => Err(unexpected(other, "Present")),
        }
    }
}

/// Metadata service reached over TCP
#[derive(Debug, Clone)]
pub struct RemoteMetaStore {
    endpoint: Endpoint,
}

impl RemoteMetaStore {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            endpoint: Endpoint {
                addr: addr.into(),
                timeout: DEFAULT_RPC_TIMEOUT,
            },
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.endpoint.timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.endpoint.addr
    }
}

#[async_trait::async_trait]
impl MetaStore for RemoteMetaStore {
    async fn get_file_info_map(&self) -> Result<FileInfoMap, StoreError> {
        match self.endpoint.call(Request::GetFileInfoMap).await? {
            Response::FileInfoMap(map) => Ok(map),
            other => Err(unexpected(other, "FileInfoMap")),
        }
    }

    async fn update_file(&self, record: FileRecord) -> Result<i64, StoreError> {
        match self.endpoint.call(Request::UpdateFile(record)).await? {
            Response::Version(version) => Ok(version),
            other => Err(unexpected(other, "Version")),
        }
    }

    async fn get_block_store_addrs(&self) -> Result<Vec<String>, StoreError> {
        match self.endpoint.call(Request::GetBlockStoreAddrs).await? {
            Response::BlockStoreAddrs(addrs) => Ok(addrs),
            other => Err(unexpected(other, "BlockStoreAddrs")),
        }
    }
}

/// Opens [`RemoteBlockStore`] handles for shard addresses; nothing is dialed until a call
#[derive(Debug, Clone)]
pub struct TcpConnector {
    timeout: Duration,
}

impl TcpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_RPC_TIMEOUT)
    }
}

impl BlockStoreConnector for TcpConnector {
    fn connect(&self, addr: &str) -> Result<Arc<dyn BlockStore>, StoreError> {
        Ok(Arc::new(RemoteBlockStore::new(addr).with_timeout(self.timeout)))
    }
}
