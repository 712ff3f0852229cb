use anyhow::{Context, Result};
use mmdbio::{export, Database, ExportOptions, FieldPath};
use serde_json::Value;
use std::path::PathBuf;

use crate::cli_utils::write_json_file;

pub fn cmd_export(db: PathBuf, out: PathBuf, fields: Vec<String>, range: Vec<String>) -> Result<()> {
    let fields: Vec<FieldPath> = fields
        .iter()
        .filter(|f| !f.trim().is_empty())
        .map(|f| FieldPath::parse(f.trim()))
        .collect();
    let ranges: Vec<&str> = range
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .collect();

    let options = ExportOptions::default()
        .with_fields(fields)
        .with_ranges(&ranges)
        .with_context(|| format!("Invalid range '{}'", ranges.join(",")))?;

    let database = Database::open(&db)
        .with_context(|| format!("Failed to open MMDB: {}", db.display()))?;

    let outcome = export(&database, &options)?;
    if outcome.warnings > 0 {
        eprintln!("⚠️  {} records could not be decoded", outcome.warnings);
    }

    let count = outcome.records.len();
    write_json_file(&out, &Value::Object(outcome.records))?;
    println!("Exported {} records to {}", count, out.display());
    Ok(())
}
