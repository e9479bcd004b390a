//! Show the last-synced state and local changes since

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::path::Path;
use surf_cli::config::SurfConfig;
use surf_cli::util;
use surf_core::{FileRecord, INVALID_VERSION};
use surf_index::LocalIndex;
use surf_sync::{scan_dir, IgnoreRules};

/// Local state of one file relative to the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
enum Change {
    New,
    Modified,
    Deleted,
}

#[derive(Serialize)]
struct StatusEntry<'a> {
    filename: &'a str,
    version: i64,
    blocks: usize,
    tombstone: bool,
    conflict: bool,
}

#[derive(Serialize)]
struct StatusOutput<'a> {
    files: Vec<StatusEntry<'a>>,
    changes: Vec<(String, Change)>,
}

pub async fn run(base_dir: &Path, json: bool) -> Result<()> {
    let base_dir = util::resolve_base_dir(base_dir)?;
    let (config, _) = SurfConfig::load(Some(&base_dir))?;
    config.validate().context("Invalid configuration")?;

    let index = LocalIndex::load(&base_dir).context("Failed to load local index")?;
    let changes = local_changes(&base_dir, &config, &index)?;

    if json {
        let output = StatusOutput {
            files: index
                .iter()
                .map(|(name, record)| StatusEntry {
                    filename: name,
                    version: record.version,
                    blocks: record.blocks.digests().len(),
                    tombstone: record.is_tombstone(),
                    conflict: record.version == INVALID_VERSION,
                })
                .collect(),
            changes,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", "Sync Status".bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    println!("Directory:     {}", base_dir.display().to_string().cyan());

    let index_path = LocalIndex::path_in(&base_dir);
    match std::fs::metadata(&index_path) {
        Ok(meta) => println!("Index:         {}", util::format_size(meta.len())),
        Err(_) => println!("Index:         {}", "never synced".yellow()),
    }
    println!();

    println!("{}", "Last synced".bold());
    if index.is_empty() {
        println!("  {}", "(no files)".dimmed());
    }
    for (name, record) in index.iter() {
        print_record(name, record);
    }

    println!();
    println!("{}", "Changes since last sync".bold());
    if changes.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for (name, change) in &changes {
        match change {
            Change::New => println!("  {} {}", "new:     ".green(), name),
            Change::Modified => println!("  {} {}", "modified:".yellow(), name),
            Change::Deleted => println!("  {} {}", "deleted: ".red(), name),
        }
    }

    Ok(())
}

fn print_record(name: &str, record: &FileRecord) {
    if record.is_tombstone() {
        println!(
            "  {} {} {}",
            format!("v{:<4}", record.version).dimmed(),
            name.dimmed(),
            "(deleted)".dimmed()
        );
    } else if record.version == INVALID_VERSION {
        println!(
            "  {} {} {}",
            "v?   ".yellow(),
            name,
            "(lost an update race, remote copy will be pulled)".yellow()
        );
    } else {
        println!(
            "  {} {} {}",
            format!("v{:<4}", record.version).cyan(),
            name,
            format!("({})", util::plural(record.blocks.digests().len(), "block")).dimmed()
        );
    }
}

/// Compare a fresh scan with the index, without contacting any service
fn local_changes(base_dir: &Path, config: &SurfConfig, index: &LocalIndex) -> Result<Vec<(String, Change)>> {
    let options = config.sync_options();
    let rules = IgnoreRules::load(base_dir, &options.ignore).context("Failed to load ignore rules")?;
    let scan = scan_dir(base_dir, options.block_size, &rules).context("Failed to scan directory")?;

    let mut changes = Vec::new();
    for (name, digests) in &scan.files {
        match index.get(name) {
            None => changes.push((name.clone(), Change::New)),
            Some(record) if record.is_tombstone() => changes.push((name.clone(), Change::New)),
            Some(record) if record.blocks.digests() != digests.as_slice() => {
                changes.push((name.clone(), Change::Modified));
            }
            Some(_) => {}
        }
    }
    for (name, record) in index.iter() {
        if !record.is_tombstone() && scan.is_gone(base_dir, name) {
            changes.push((name.clone(), Change::Deleted));
        }
    }
    changes.sort();
    Ok(changes)
}
