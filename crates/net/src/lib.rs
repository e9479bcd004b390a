//! Surf Net - TCP transport for the block and metadata services
//!
//! [`serve_block`] and [`serve_meta`] expose any store implementation over
//! TCP; [`RemoteBlockStore`], [`RemoteMetaStore`] and [`TcpConnector`] are
//! the matching clients.

pub mod client;
pub mod protocol;
pub mod server;

pub use client::{RemoteBlockStore, RemoteMetaStore, TcpConnector, DEFAULT_RPC_TIMEOUT};
pub use protocol::{ProtocolError, Request, Response, MAX_FRAME_LEN};
pub use server::{serve_block, serve_meta};
