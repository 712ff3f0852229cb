mod cli_utils;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{
    cmd_diff, cmd_export, cmd_import, cmd_inspect, cmd_metadata, cmd_read, cmd_stats,
    cmd_verify, ImportArgs, ReadArgs,
};

#[derive(Parser)]
#[command(name = "mmdbio")]
#[command(
    about = "Convert IP intelligence data between JSON and MaxMind DB files",
    long_about = "mmdbio - build, read, compare and inspect MaxMind DB (.mmdb) files\n\n\
    Import a JSON document of network -> fields into an .mmdb database, export\n\
    a database back to JSON, look up addresses, and compare two databases.\n\n\
    Input keys may be:\n\
      • A CIDR block, e.g. \"1.2.3.0/24\"\n\
      • A single IP address, e.g. \"8.8.8.8\"\n\
      • An IP range, e.g. \"1.2.3.0-1.2.3.255\"\n\n\
    Examples:\n\
      mmdbio import --in data.json --out data.mmdb --ip 4 --size 24\n\
      mmdbio read --db data.mmdb --ip 1.2.3.4 --fields threat_score\n\
      mmdbio export --db data.mmdb --out data.json --range 1.2.0.0/16\n\
      mmdbio diff --old old.mmdb --new new.mmdb --summary\n\
      mmdbio verify --db data.mmdb\n\n\
    Set RUST_LOG=debug for detailed progress on stderr."
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import JSON data and generate a MaxMind .mmdb file
    Import {
        /// Input JSON file path (.gz accepted, "-" for stdin)
        #[arg(short = 'i', long = "in", value_name = "FILE")]
        input: PathBuf,

        /// Output .mmdb file path
        #[arg(short = 'o', long = "out", value_name = "FILE")]
        output: PathBuf,

        /// IP version (4 or 6)
        #[arg(long = "ip", default_value = "6")]
        ip_version: u64,

        /// Record size (24, 28, or 32)
        #[arg(long = "size", default_value = "32")]
        record_size: u16,

        /// Merge strategy for overlapping entries: none, toplevel, recurse
        #[arg(long, default_value = "none")]
        merge: String,

        /// Alias IPv4-mapped (::ffff:0:0/96) and 6to4 (2002::/16) networks to the IPv4 data
        #[arg(long = "alias-6to4")]
        alias_6to4: bool,

        /// Reject data in reserved networks (private, loopback, documentation...)
        #[arg(long)]
        disallow_reserved: bool,

        /// Database type written to metadata
        #[arg(short = 't', long, default_value = mmdbio::writer::DEFAULT_DATABASE_TYPE)]
        title: String,

        /// English description written to metadata
        #[arg(short = 'd', long, default_value = mmdbio::writer::DEFAULT_DESCRIPTION)]
        description: String,
    },

    /// Export an .mmdb file to JSON
    Export {
        /// Path to the .mmdb file
        #[arg(long, value_name = "FILE")]
        db: PathBuf,

        /// Path to the output JSON file
        #[arg(long, value_name = "FILE")]
        out: PathBuf,

        /// Comma-separated list of fields to extract (e.g. location.country.name,city.names.en)
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,

        /// Comma-separated CIDR ranges; only overlapping networks are exported
        #[arg(long, value_delimiter = ',')]
        range: Vec<String>,
    },

    /// Read IP data (single address, batch list, or every address of a CIDR)
    Read {
        /// Path to the .mmdb file
        #[arg(long, value_name = "FILE")]
        db: PathBuf,

        /// IP address to look up
        #[arg(long, conflicts_with_all = ["input", "range"])]
        ip: Option<String>,

        /// File with one IP per line ("-" for stdin)
        #[arg(long, value_name = "FILE", conflicts_with = "range")]
        input: Option<PathBuf>,

        /// CIDR range whose every address is looked up
        #[arg(long)]
        range: Option<String>,

        /// Comma-separated list of fields to extract
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,

        /// Write the JSON result to this file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Compare two .mmdb files
    Diff {
        /// The older database
        #[arg(long, value_name = "FILE")]
        old: PathBuf,

        /// The newer database
        #[arg(long, value_name = "FILE")]
        new: PathBuf,

        /// Print only the counts
        #[arg(long)]
        summary: bool,

        /// Output the result as JSON
        #[arg(long, conflicts_with = "summary")]
        json: bool,
    },

    /// Show the schema of the record for a sample IP
    Inspect {
        /// Path to the .mmdb file
        #[arg(long, value_name = "FILE")]
        db: PathBuf,

        /// IP whose record is inspected
        #[arg(long, default_value = commands::inspect_cmd::DEFAULT_SAMPLE_IP)]
        sample_ip: String,

        /// Optional path to export the schema as JSON
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Print database metadata
    Metadata {
        /// Path to the .mmdb file
        #[arg(long, value_name = "FILE")]
        db: PathBuf,
    },

    /// Check that an .mmdb file is well-formed (exit 1 when it is not)
    Verify {
        /// Path to the .mmdb file
        #[arg(long, value_name = "FILE")]
        db: PathBuf,
    },

    /// Display statistics and metadata of an .mmdb file
    Stats {
        /// Path to the .mmdb file
        #[arg(long, value_name = "FILE")]
        db: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Import {
            input,
            output,
            ip_version,
            record_size,
            merge,
            alias_6to4,
            disallow_reserved,
            title,
            description,
        } => cmd_import(ImportArgs {
            input,
            output,
            ip_version,
            record_size,
            merge,
            alias_6to4,
            disallow_reserved,
            title,
            description,
        }),
        Commands::Export {
            db,
            out,
            fields,
            range,
        } => cmd_export(db, out, fields, range),
        Commands::Read {
            db,
            ip,
            input,
            range,
            fields,
            out,
        } => cmd_read(ReadArgs {
            db,
            ip,
            input,
            range,
            fields,
            out,
        }),
        Commands::Diff {
            old,
            new,
            summary,
            json,
        } => cmd_diff(old, new, summary, json),
        Commands::Inspect { db, sample_ip, out } => cmd_inspect(db, sample_ip, out),
        Commands::Metadata { db } => cmd_metadata(db),
        Commands::Verify { db } => cmd_verify(db),
        Commands::Stats { db, json } => cmd_stats(db, json),
    }
}
