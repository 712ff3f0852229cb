use anyhow::{bail, Context, Result};
use mmdbio::projection::{lookup_batch, range_addresses, render};
use mmdbio::{file_reader, Database, FieldPath};
use serde_json::{Map, Value};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::cli_utils::{read_lines, to_pretty_json, write_json_file};

pub struct ReadArgs {
    pub db: PathBuf,
    pub ip: Option<String>,
    pub input: Option<PathBuf>,
    pub range: Option<String>,
    pub fields: Vec<String>,
    pub out: Option<PathBuf>,
}

pub fn cmd_read(args: ReadArgs) -> Result<()> {
    let fields: Vec<FieldPath> = args
        .fields
        .iter()
        .filter(|f| !f.trim().is_empty())
        .map(|f| FieldPath::parse(f.trim()))
        .collect();

    let database = Database::open(&args.db)
        .with_context(|| format!("Failed to open MMDB: {}", args.db.display()))?;

    let result = if let Some(input) = &args.input {
        let reader = file_reader::open(input)
            .with_context(|| format!("Failed to open input file: {}", input.display()))?;
        let lines = read_lines(reader)
            .with_context(|| format!("Failed to read input file: {}", input.display()))?;
        Value::Object(lookup_batch(&database, &lines, &fields))
    } else if let Some(range) = &args.range {
        let addresses = range_addresses(range.trim())
            .with_context(|| format!("Invalid range '{}'", range))?;
        let inputs = addresses.iter().map(IpAddr::to_string);
        Value::Object(lookup_batch(&database, inputs, &fields))
    } else if let Some(ip) = &args.ip {
        match read_single(&database, ip, &fields)? {
            Some(value) => value,
            None => {
                println!("No data found for that IP.");
                return Ok(());
            }
        }
    } else {
        bail!("one of --ip, --input or --range is required");
    };

    match &args.out {
        Some(path) => {
            write_json_file(path, &result)?;
            println!("Results saved to {}", path.display());
        }
        None => println!("{}", to_pretty_json(&result)?),
    }
    Ok(())
}

fn read_single(database: &Database, ip: &str, fields: &[FieldPath]) -> Result<Option<Value>> {
    let addr: IpAddr = ip
        .trim()
        .parse()
        .with_context(|| format!("Invalid IP address: {}", ip))?;

    let Some(record) = database
        .lookup(addr)
        .with_context(|| format!("Lookup failed for {}", addr))?
    else {
        return Ok(None);
    };

    if fields.is_empty() {
        return Ok(Some(render(&record, fields)));
    }

    let mut wrapped = Map::new();
    wrapped.insert(ip.trim().to_string(), render(&record, fields));
    Ok(Some(Value::Object(wrapped)))
}
