//! Run the in-memory services over TCP

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::sync::Arc;
use surf_store::{MemoryBlockStore, MemoryMetaStore};
use tokio::net::TcpListener;
use tracing::info;

/// Serve a metadata store that advertises `block_stores` as its shard directory
pub async fn run_meta(listen: &str, block_stores: Vec<String>) -> Result<()> {
    let listener = bind(listen).await?;
    let store = Arc::new(MemoryMetaStore::new(block_stores.clone()));

    announce(&listener, "metadata")?;
    for addr in &block_stores {
        println!("  {} {}", "block store".dimmed(), addr);
    }

    tokio::select! {
        result = surf_net::serve_meta(listener, store) => result.context("Metadata service failed"),
        _ = tokio::signal::ctrl_c() => {
            info!("metadata service shutting down");
            Ok(())
        }
    }
}

/// Serve an empty block store
pub async fn run_block(listen: &str) -> Result<()> {
    let listener = bind(listen).await?;
    let store = Arc::new(MemoryBlockStore::new());

    announce(&listener, "block")?;

    tokio::select! {
        result = surf_net::serve_block(listener, store) => result.context("Block service failed"),
        _ = tokio::signal::ctrl_c() => {
            info!("block service shutting down");
            Ok(())
        }
    }
}

async fn bind(listen: &str) -> Result<TcpListener> {
    TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to listen on {listen}"))
}

fn announce(listener: &TcpListener, service: &str) -> Result<()> {
    use std::io::Write;

    let addr = listener.local_addr()?;
    println!("{} {} service listening on {}", "✓".green(), service, addr.to_string().cyan());
    std::io::stdout().flush()?;
    Ok(())
}
