use anyhow::{Context, Result};
use mmdbio::Database;
use serde_json::Value;
use std::path::PathBuf;

use crate::cli_utils::{format_languages, format_rfc1123, to_pretty_json};

pub fn cmd_metadata(db: PathBuf) -> Result<()> {
    let database = Database::open(&db)
        .with_context(|| format!("Failed to open MMDB: {}", db.display()))?;
    let meta = database.metadata();

    let description = Value::Object(
        meta.description
            .iter()
            .map(|(lang, text)| (lang.clone(), Value::String(text.clone())))
            .collect(),
    );

    println!("MMDB Metadata");
    println!("-----------------------------");
    println!("Database Type: {}", meta.database_type);
    println!("IP Version:    {}", meta.ip_version.number());
    println!("Record Size:   {} bits", meta.record_size.bits());
    println!("Node Count:    {}", meta.node_count);
    println!("Build Date:    {}", format_rfc1123(meta.build_epoch));
    println!("Languages:     {}", format_languages(&meta.languages));
    println!("Description:");
    println!("{}", to_pretty_json(&description)?);
    Ok(())
}
