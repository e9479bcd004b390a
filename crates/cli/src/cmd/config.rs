//! Show the effective configuration

use anyhow::Result;
use owo_colors::OwoColorize;
use std::path::Path;
use surf_cli::config::{global_config_path, local_config_path, SurfConfig};
use surf_cli::util;

pub async fn run(base_dir: Option<&Path>, path_only: bool) -> Result<()> {
    if path_only {
        match global_config_path() {
            Some(path) => println!("{}", path.display()),
            None => println!("{}", "No user configuration directory on this platform".yellow()),
        }
        if let Some(base) = base_dir {
            println!("{}", local_config_path(base).display());
        }
        return Ok(());
    }

    let (config, sources) = SurfConfig::load(base_dir)?;

    println!("{}", "Effective Configuration".bold());
    if sources.is_empty() {
        println!("{}: {}\n", "Sources".dimmed(), "built-in defaults".dimmed());
    } else {
        for source in &sources {
            println!("{}: {}", "Source".dimmed(), source.display().dimmed());
        }
        println!();
    }

    println!("{}", "[sync]".yellow());
    println!(
        "  {} = {} {}",
        "block_size".cyan(),
        config.sync.block_size,
        format!("({})", util::format_size(config.sync.block_size as u64)).dimmed()
    );
    println!("  {} = {}", "parallelism".cyan(), config.sync.parallelism);
    println!("  {} = {}", "use_surfignore".cyan(), config.sync.use_surfignore);
    println!("  {} = {:?}", "ignore_patterns".cyan(), config.sync.ignore_patterns);

    println!("\n{}", "[remote]".yellow());
    println!("  {} = {:?}", "meta_addr".cyan(), config.remote.meta_addr);
    println!(
        "  {} = {} {}",
        "rpc_timeout_ms".cyan(),
        config.remote.rpc_timeout_ms,
        format!("({}s)", config.remote.rpc_timeout_ms as f64 / 1000.0).dimmed()
    );

    if let Err(e) = config.validate() {
        println!("\n{} {}", "✗ Invalid:".red(), e);
    }

    println!("\n{}", "Valid Ranges:".bold());
    println!("  block_size: 1-67108864 (64 MiB)");
    println!("  parallelism: 1 or more");
    println!("  rpc_timeout_ms: 1 or more");

    Ok(())
}
