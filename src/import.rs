//! Document import
//!
//! Turns a JSON document of `network key -> fields` into a serialized
//! database. Keys are resolved, fields converted, and each pair handed to
//! the writer. Entries that cannot be used are skipped and reported; the
//! import only fails as a whole when nothing could be inserted.

use std::fmt;

use log::{debug, warn};
use serde_json::{Map, Value};

use crate::convert::{convert_record, DocumentValue};
use crate::data_section::DataValue;
use crate::error::{MmdbioError, Result};
use crate::key_resolver::{resolve, InsertionPlan, SkipReason};
use crate::mmdb::IpVersion;
use crate::writer::{DatabaseWriter, WriterOptions};

/// Why one document entry was not inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipCause {
    /// The key is not a usable network
    Key(SkipReason),
    /// The entry's value is not an object of fields
    NotAnObject,
    /// The writer refused the network (reserved, aliased...)
    Rejected(String),
}

impl fmt::Display for SkipCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipCause::Key(reason) => reason.fmt(f),
            SkipCause::NotAnObject => f.write_str("value is not an object"),
            SkipCause::Rejected(msg) => f.write_str(msg),
        }
    }
}

/// A document entry that was not inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    /// The entry's key as written in the document
    pub key: String,
    /// Why it was skipped
    pub cause: SkipCause,
}

/// Result of a successful import
#[derive(Debug)]
pub struct ImportOutcome {
    /// Complete database file
    pub database: Vec<u8>,
    /// Number of entries inserted
    pub inserted: usize,
    /// Entries that were skipped, in key order
    pub skipped: Vec<SkippedEntry>,
}

/// Build a database from a parsed document
///
/// `source` names the document in error messages.
pub fn import_document(
    document: &DocumentValue,
    options: &WriterOptions,
    source: &str,
) -> Result<ImportOutcome> {
    let Value::Object(entries) = document else {
        return Err(MmdbioError::InvalidDocument(format!(
            "{}: top level must be an object of network -> fields",
            source
        )));
    };
    if entries.is_empty() {
        return Err(MmdbioError::EmptyDocument(source.to_string()));
    }

    let mut writer = DatabaseWriter::new(options.clone())?;
    let ip_version = options.ip_version;

    let mut keys: Vec<&String> = entries.keys().collect();
    keys.sort();

    let mut skipped = Vec::new();
    for key in keys {
        let fields = &entries[key.as_str()];
        if let Err(cause) = import_entry(&mut writer, key, fields, ip_version) {
            warn!("skipping {}: {}", key, cause);
            skipped.push(SkippedEntry {
                key: key.clone(),
                cause,
            });
        }
    }

    let inserted = writer.inserted();
    if inserted == 0 {
        return Err(MmdbioError::NothingInserted {
            skipped: skipped.len(),
        });
    }

    debug!("{} inserted, {} skipped", inserted, skipped.len());
    let database = writer.build()?;
    Ok(ImportOutcome {
        database,
        inserted,
        skipped,
    })
}

/// Parse JSON text and import it
pub fn import_json(text: &str, options: &WriterOptions, source: &str) -> Result<ImportOutcome> {
    let document: Value = serde_json::from_str(text)
        .map_err(|e| MmdbioError::InvalidDocument(format!("{}: {}", source, e)))?;
    import_document(&document, options, source)
}

fn import_entry(
    writer: &mut DatabaseWriter,
    key: &str,
    fields: &DocumentValue,
    ip_version: IpVersion,
) -> std::result::Result<(), SkipCause> {
    let plan = resolve(key, ip_version).map_err(SkipCause::Key)?;

    let record: DataValue = match fields {
        Value::Object(map) => convert_record(map).into(),
        Value::Null => convert_record(&Map::new()).into(),
        _ => return Err(SkipCause::NotAnObject),
    };

    let inserted = match plan {
        InsertionPlan::Single(network) => writer.insert_network(network, &record),
        InsertionPlan::Range { start, end } => writer.insert_range(start, end, &record),
    };
    inserted.map_err(|e| SkipCause::Rejected(e.to_string()))
}
