use anyhow::{Context, Result};
use mmdbio::{diff, Database, DatabaseDiff, Snapshot};
use std::path::{Path, PathBuf};

use crate::cli_utils::to_pretty_json;

pub fn cmd_diff(old: PathBuf, new: PathBuf, summary: bool, json: bool) -> Result<()> {
    let old_snapshot = snapshot(&old, "old")?;
    let new_snapshot = snapshot(&new, "new")?;

    let changes = diff(&old_snapshot, &new_snapshot);

    if summary {
        println!("{}", changes.summary());
    } else if json {
        println!("{}", to_pretty_json(&changes.to_json())?);
    } else {
        print_listing(&changes);
    }
    Ok(())
}

fn snapshot(path: &Path, label: &str) -> Result<Snapshot> {
    let database = Database::open(path)
        .with_context(|| format!("Failed to open {} MMDB: {}", label, path.display()))?;
    let snapshot = Snapshot::from_database(&database);
    if snapshot.warnings > 0 {
        eprintln!("warning: error reading {} db", label);
    }
    Ok(snapshot)
}

fn print_listing(changes: &DatabaseDiff) {
    println!("Added: {}", changes.added.len());
    println!("Removed: {}", changes.removed.len());
    println!("Modified: {}", changes.modified.len());
    println!();

    let sections = [
        ("Added:", changes.added.keys().collect::<Vec<_>>()),
        ("Removed:", changes.removed.keys().collect()),
        ("Modified:", changes.modified.keys().collect()),
    ];
    for (title, networks) in sections {
        if networks.is_empty() {
            continue;
        }
        println!("{}", title);
        for network in networks {
            println!("   {}", network);
        }
    }
}
