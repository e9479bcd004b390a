//! TCP front ends for the block and metadata services

use std::net::SocketAddr;
use std::sync::Arc;

use surf_store::{BlockStore, MetaStore, StoreError};
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::protocol::{read_frame, write_frame, ProtocolError, Request, Response};

/// Answers decoded requests for one kind of service
#[async_trait::async_trait]
trait Handler: Send + Sync + 'static {
    async fn handle(&self, request: Request) -> Response;
}

struct BlockHandler(Arc<dyn BlockStore>);

struct MetaHandler(Arc<dyn MetaStore>);

#[async_trait::async_trait]
impl Handler for BlockHandler {
    async fn handle(&self, request: Request) -> Response {
        let result = match request {
            Request::GetBlock(digest) => self.0.get_block(&digest).await.map(Response::Block),
            Request::PutBlock(block) => self.0.put_block(block).await.map(Response::Stored),
            Request::HasBlocks(digests) => self.0.has_blocks(&digests).await.map(Response::Present),
            other => return unsupported(&other, "block"),
        };
        into_response(result)
    }
}

#[async_trait::async_trait]
impl Handler for MetaHandler {
    async fn handle(&self, request: Request) -> Response {
        let result = match request {
            Request::GetFileInfoMap => self.0.get_file_info_map().await.map(Response::FileInfoMap),
            Request::UpdateFile(record) => self.0.update_file(record).await.map(Response::Version),
            Request::GetBlockStoreAddrs => self
                .0
                .get_block_store_addrs()
                .await
                .map(Response::BlockStoreAddrs),
            other => return unsupported(&other, "metadata"),
        };
        into_response(result)
    }
}

fn into_response(result: Result<Response, StoreError>) -> Response {
    match result {
        Ok(response) => response,
        Err(StoreError::NotFound(digest)) => Response::NotFound(digest),
        Err(e) => Response::Error(e.to_string()),
    }
}

fn unsupported(request: &Request, service: &str) -> Response {
    warn!(?request, service, "request not served here");
    Response::Error(format!("{service} service does not handle this request"))
}

/// Serve `store` as a block service until the listener fails
pub async fn serve_block(listener: TcpListener, store: Arc<dyn BlockStore>) -> std::io::Result<()> {
    serve(listener, Arc::new(BlockHandler(store)), "block").await
}

/// Serve `store` as the metadata service until the listener fails
pub async fn serve_meta(listener: TcpListener, store: Arc<dyn MetaStore>) -> std::io::Result<()> {
    serve(listener, Arc::new(MetaHandler(store)), "metadata").await
}

async fn serve<H: Handler>(listener: TcpListener, handler: Arc<H>, service: &'static str) -> std::io::Result<()> {
    info!(addr = %listener.local_addr()?, service, "listening");
    loop {
        let (stream, peer) = listener.accept().await?;
        let handler = handler.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer, handler.as_ref()).await {
                warn!(%peer, service, error = %e, "connection closed with error");
            }
        });
    }
}

async fn handle_connection<H: Handler>(
    stream: TcpStream,
    peer: SocketAddr,
    handler: &H,
) -> Result<(), ProtocolError> {
    debug!(%peer, "accepted connection");
    stream.set_nodelay(true)?;
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    while let Some(request) = read_frame::<_, Request>(&mut reader).await? {
        let response = handler.handle(request).await;
        write_frame(&mut writer, &response).await?;
    }
    debug!(%peer, "peer disconnected");
    Ok(())
}
