//! Surf CLI - surf command

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use surf_cli::config::Overrides;
use tracing_subscriber::EnvFilter;

mod cmd;

/// Surf - block-level file sync against a shared metadata service
#[derive(Parser)]
#[command(name = "surf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync pass over a directory
    Sync {
        /// Directory to sync
        base_dir: PathBuf,
        /// Metadata service address (overrides configuration)
        #[arg(long)]
        meta: Option<String>,
        /// Block size in bytes (overrides configuration)
        #[arg(long)]
        block_size: Option<usize>,
        /// Files transferred concurrently (overrides configuration)
        #[arg(long)]
        parallelism: Option<usize>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a service over TCP until interrupted
    #[command(subcommand)]
    Serve(ServeCommands),
    /// Show the last-synced state of a directory and its local changes
    Status {
        /// Synced directory
        base_dir: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the effective configuration
    Config {
        /// Directory whose surf.toml to include
        base_dir: Option<PathBuf>,
        /// Only print the configuration file locations
        #[arg(long)]
        path: bool,
    },
}

#[derive(Subcommand)]
enum ServeCommands {
    /// In-memory metadata service
    Meta {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8080")]
        listen: String,
        /// Block-store shard address to advertise (repeatable)
        #[arg(long = "block-store", required = true)]
        block_stores: Vec<String>,
    },
    /// In-memory block service
    Block {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8081")]
        listen: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so command output stays parseable
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sync { base_dir, meta, block_size, parallelism, json } => {
            let overrides = Overrides {
                meta_addr: meta,
                block_size,
                parallelism,
            };
            cmd::sync::run(&base_dir, overrides, json).await
        }
        Commands::Serve(serve_cmd) => match serve_cmd {
            ServeCommands::Meta { listen, block_stores } => cmd::serve::run_meta(&listen, block_stores).await,
            ServeCommands::Block { listen } => cmd::serve::run_block(&listen).await,
        },
        Commands::Status { base_dir, json } => cmd::status::run(&base_dir, json).await,
        Commands::Config { base_dir, path } => cmd::config::run(base_dir.as_deref(), path).await,
    }
}
