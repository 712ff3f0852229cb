use anyhow::{Context, Result};
use mmdbio::writer::{parse_ip_version, parse_record_size};
use mmdbio::{file_reader, import_json, MergeStrategy, WriterOptions};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

pub struct ImportArgs {
    pub input: PathBuf,
    pub output: PathBuf,
    pub ip_version: u64,
    pub record_size: u16,
    pub merge: String,
    pub alias_6to4: bool,
    pub disallow_reserved: bool,
    pub title: String,
    pub description: String,
}

pub fn cmd_import(args: ImportArgs) -> Result<()> {
    // Configuration errors come first, before any file is touched
    let ip_version = parse_ip_version(args.ip_version)?;
    let record_size = parse_record_size(args.record_size)?;
    let merge: MergeStrategy = args.merge.parse()?;

    let options = WriterOptions::default()
        .with_database_type(args.title)
        .with_description("en", args.description)
        .with_ip_version(ip_version)
        .with_record_size(record_size)
        .with_merge(merge)
        .with_ipv4_aliasing(args.alias_6to4)
        .with_reserved_networks(!args.disallow_reserved);

    let source = args.input.display().to_string();
    let text = file_reader::read_to_string(&args.input)
        .with_context(|| format!("failed to open input: {}", source))?;

    let outcome = import_json(&text, &options, &source)?;

    let file = File::create(&args.output)
        .with_context(|| format!("failed to create output: {}", args.output.display()))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(&outcome.database)
        .and_then(|_| writer.flush())
        .with_context(|| format!("failed to write mmdb: {}", args.output.display()))?;

    eprintln!(
        "✅ Successfully wrote {} entries to {}",
        outcome.inserted,
        args.output.display()
    );
    if !outcome.skipped.is_empty() {
        eprintln!("⚠️  {} entries skipped (see warnings above)", outcome.skipped.len());
    }
    Ok(())
}
