//! Wire protocol between sync clients and the block and metadata services
//!
//! Every message is one frame (all integers are big-endian):
//!
//! ```text
//! +----------------+------------------+
//! | length (4 BE)  | bincode payload  |
//! +----------------+------------------+
//! ```
//!
//! A connection carries any number of request/response pairs in order.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use surf_core::{Block, Digest, FileInfoMap, FileRecord};
use surf_store::StoreError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted payload: a 64 MiB block plus envelope headroom
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024 + 64 * 1024;

/// Calls a client can make
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    GetBlock(Digest),
    PutBlock(Block),
    HasBlocks(Vec<Digest>),
    GetFileInfoMap,
    UpdateFile(FileRecord),
    GetBlockStoreAddrs,
}

/// Replies, one per request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Block(Block),
    NotFound(Digest),
    Stored(bool),
    Present(Vec<Digest>),
    FileInfoMap(FileInfoMap),
    Version(i64),
    BlockStoreAddrs(Vec<String>),
    /// The service failed or does not serve this request
    Error(String),
}

impl Response {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Response::Block(_) => "Block",
            Response::NotFound(_) => "NotFound",
            Response::Stored(_) => "Stored",
            Response::Present(_) => "Present",
            Response::FileInfoMap(_) => "FileInfoMap",
            Response::Version(_) => "Version",
            Response::BlockStoreAddrs(_) => "BlockStoreAddrs",
            Response::Error(_) => "Error",
        }
    }
}

/// Framing and encoding failures
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame of {0} bytes exceeds limit of {MAX_FRAME_LEN}")]
    FrameTooLarge(usize),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}

impl From<ProtocolError> for StoreError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(e) => StoreError::Io(e),
            other => StoreError::Transport(other.to_string()),
        }
    }
}

/// Encode `msg` and write it as one frame
pub async fn write_frame<W, T>(w: &mut W, msg: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = bincode::serialize(msg)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(payload.len()));
    }
    w.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    w.write_all(&payload).await?;
    w.flush().await?;
    Ok(())
}

/// Read one frame; `None` when the peer closed the connection between frames
pub async fn read_frame<R, T>(r: &mut R) -> Result<Option<T>, ProtocolError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut header = [0u8; 4];
    match r.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload).await?;
    Ok(Some(bincode::deserialize(&payload)?))
}
