use anyhow::{Context, Result};
use mmdbio::Database;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::cli_utils::{format_languages, format_rfc3339};

#[derive(Serialize)]
struct DatabaseStats {
    database_type: String,
    description: BTreeMap<String, String>,
    ip_version: u16,
    record_size: u16,
    node_count: u32,
    build_epoch: String,
    languages: Vec<String>,
    ipv4_count: usize,
    ipv6_count: usize,
    networks: usize,
}

pub fn cmd_stats(db: PathBuf, json: bool) -> Result<()> {
    let database = Database::open(&db)
        .with_context(|| format!("Failed to open MMDB: {}", db.display()))?;
    let counts = database
        .network_counts()
        .with_context(|| format!("Failed to iterate networks: {}", db.display()))?;
    let meta = database.metadata();

    let stats = DatabaseStats {
        database_type: meta.database_type.clone(),
        description: meta.description.clone(),
        ip_version: meta.ip_version.number(),
        record_size: meta.record_size.bits(),
        node_count: meta.node_count,
        build_epoch: format_rfc3339(meta.build_epoch),
        languages: meta.languages.clone(),
        ipv4_count: counts.ipv4,
        ipv6_count: counts.ipv6,
        networks: counts.total(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let rule = "────────────────────────────";
    println!("=====MMDB Statistics========");
    println!("{}", rule);
    println!("Database Type: {}", stats.database_type);
    println!(
        "Description:   {}",
        stats.description.get("en").map(String::as_str).unwrap_or("")
    );
    println!("IP Version:    {}", stats.ip_version);
    println!("Record Size:   {} bits", stats.record_size);
    println!("Node Count:    {}", stats.node_count);
    println!("Build Epoch:   {}", stats.build_epoch);
    println!("Languages:     {}", format_languages(&stats.languages));
    println!("{}", rule);
    println!("IPv4 Count:    {}", stats.ipv4_count);
    println!("IPv6 Count:    {}", stats.ipv6_count);
    println!("Networks:      {}", stats.networks);
    println!("{}", rule);
    Ok(())
}
