//! Run one sync pass over a base directory

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::Path;
use std::sync::Arc;
use surf_net::{RemoteMetaStore, TcpConnector};
use surf_sync::{SyncEngine, SyncReport};
use surf_cli::config::{Overrides, SurfConfig};
use surf_cli::util;

pub async fn run(base_dir: &Path, overrides: Overrides, json: bool) -> Result<()> {
    let base_dir = util::resolve_base_dir(base_dir)?;

    let (mut config, _) = SurfConfig::load(Some(&base_dir))?;
    config.apply_overrides(&overrides);
    config.validate().context("Invalid configuration")?;

    let meta = RemoteMetaStore::new(config.remote.meta_addr.clone()).with_timeout(config.rpc_timeout());
    let connector = TcpConnector::new(config.rpc_timeout());
    let engine = SyncEngine::new(Arc::new(meta), Arc::new(connector), config.sync_options());

    let spinner = util::spinner(format!("Syncing {}", base_dir.display()));
    let result = engine.sync(&base_dir).await;
    spinner.finish_and_clear();

    let report = result.with_context(|| format!("Sync of {} failed", base_dir.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&base_dir, &config, &report);
    }
    Ok(())
}

fn print_report(base_dir: &Path, config: &SurfConfig, report: &SyncReport) {
    if report.is_clean() {
        println!("{} Synced {}", "✓".green(), base_dir.display().to_string().cyan());
    } else {
        println!(
            "{} Synced {} with problems",
            "!".yellow(),
            base_dir.display().to_string().cyan()
        );
    }
    println!(
        "  {}",
        format!("metadata {} · block size {}", config.remote.meta_addr, util::format_size(config.sync.block_size as u64)).dimmed()
    );

    if !report.has_changes() && report.is_clean() {
        println!("  {}", "Already up to date".dimmed());
    }

    for name in &report.downloaded {
        println!("  {} {}", "↓".green(), name);
    }
    for name in &report.uploaded {
        println!("  {} {}", "↑".blue(), name);
    }
    for name in &report.deleted_locally {
        println!("  {} {}", "-".red(), name);
    }
    for name in &report.tie_breaks {
        println!(
            "  {} {} {}",
            "!".yellow(),
            name,
            "(same version on both sides, remote copy kept)".dimmed()
        );
    }
    for name in &report.conflicts {
        println!(
            "  {} {} {}",
            "⚠".yellow(),
            name.yellow(),
            "(another client updated it first, will re-pull on next sync)".dimmed()
        );
    }
    for skipped in &report.skipped {
        println!("  {} {}: {}", "✗".red(), skipped.filename, skipped.reason.dimmed());
    }

    println!();
    println!(
        "{} downloaded, {} uploaded, {} deleted, {} conflicts, {} skipped",
        report.downloaded.len(),
        report.uploaded.len(),
        report.deleted_locally.len(),
        report.conflicts.len(),
        report.skipped.len()
    );
}
