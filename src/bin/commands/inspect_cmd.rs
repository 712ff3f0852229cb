use anyhow::{Context, Result};
use mmdbio::{schema, Database};
use std::fs;
use std::net::IpAddr;
use std::path::PathBuf;

use crate::cli_utils::write_json_file;

pub const DEFAULT_SAMPLE_IP: &str = "4.7.229.0";

pub fn cmd_inspect(db: PathBuf, sample_ip: String, out: Option<PathBuf>) -> Result<()> {
    let database = Database::open(&db)
        .with_context(|| format!("Failed to open MMDB: {}", db.display()))?;

    let sample: IpAddr = match sample_ip.trim().parse() {
        Ok(ip) => ip,
        Err(_) => {
            log::warn!(
                "invalid sample IP '{}', using {}",
                sample_ip,
                DEFAULT_SAMPLE_IP
            );
            DEFAULT_SAMPLE_IP.parse()?
        }
    };

    let Some(record) = database
        .lookup(sample)
        .with_context(|| format!("Lookup failed for {}", sample))?
    else {
        println!("No record found for this IP.");
        return Ok(());
    };

    let schema = schema::infer(&record);

    let name = db
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| db.display().to_string());
    println!("📂 Structure for MMDB: {}", name);
    println!("────────────────────────────────────────────");
    for (path, type_name) in &schema {
        println!("{:<50} : {}", path, type_name);
    }

    if let Some(out) = out {
        if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        write_json_file(&out, &schema::to_json(&schema))?;
        println!("\n✅ Schema exported to: {}", out.display());
    }
    Ok(())
}
