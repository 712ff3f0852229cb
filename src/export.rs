//! Database export
//!
//! Walks every network of a database and renders it as the JSON document
//! the importer reads back: `{"network": record, ...}`. Output can be
//! limited to networks overlapping a set of ranges, and records can be
//! projected onto field paths.

use ipnetwork::IpNetwork;
use log::warn;
use serde_json::{Map, Value};

use crate::database::Database;
use crate::error::Result;
use crate::network::{overlaps, parse_cidr};
use crate::projection::{render, FieldPath};

/// What to export
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Project records onto these paths; whole records when empty
    pub fields: Vec<FieldPath>,
    /// Only networks overlapping one of these; every network when empty
    pub ranges: Vec<IpNetwork>,
}

impl ExportOptions {
    /// Set the field paths
    pub fn with_fields(mut self, fields: Vec<FieldPath>) -> Self {
        self.fields = fields;
        self
    }

    /// Set the range filter from CIDR strings; any invalid CIDR is an error
    pub fn with_ranges<S: AsRef<str>>(mut self, ranges: &[S]) -> Result<Self> {
        self.ranges = ranges
            .iter()
            .map(|r| parse_cidr(r.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(self)
    }

    fn selects(&self, network: &IpNetwork) -> bool {
        self.ranges.is_empty() || self.ranges.iter().any(|r| overlaps(r, network))
    }
}

/// Exported document plus the number of records that could not be decoded
#[derive(Debug, Clone, Default)]
pub struct ExportOutcome {
    /// Network -> rendered record
    pub records: Map<String, Value>,
    /// Records skipped because they failed to decode
    pub warnings: usize,
}

/// Export a database
///
/// A record that fails to decode is logged and skipped. A corrupt search
/// tree stops the export with an error.
pub fn export(db: &Database, options: &ExportOptions) -> Result<ExportOutcome> {
    let mut outcome = ExportOutcome::default();

    for item in db.networks() {
        let entry = item?;
        if !options.selects(&entry.network) {
            continue;
        }
        match entry.data {
            Ok(value) => {
                outcome
                    .records
                    .insert(entry.network.to_string(), render(&value, &options.fields));
            }
            Err(e) => {
                warn!("failed to decode {}: {}", entry.network, e);
                outcome.warnings += 1;
            }
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::import_document;
    use crate::writer::WriterOptions;
    use serde_json::json;

    fn db() -> Database {
        let doc = json!({
            "1.2.3.0/24": {"geo": {"cc": "DE"}, "score": 1},
            "8.8.8.8": {"geo": {"cc": "US"}, "score": 2},
            "2001:db8::/32": {"score": 3}
        });
        let outcome =
            import_document(&doc, &WriterOptions::default().with_build_epoch(0), "doc").unwrap();
        Database::from_bytes(outcome.database).unwrap()
    }

    #[test]
    fn test_full_export_matches_input() {
        let out = export(&db(), &ExportOptions::default()).unwrap();
        assert_eq!(out.warnings, 0);
        assert_eq!(
            Value::Object(out.records),
            json!({
                "1.2.3.0/24": {"geo": {"cc": "DE"}, "score": 1},
                "8.8.8.8/32": {"geo": {"cc": "US"}, "score": 2},
                "2001:db8::/32": {"score": 3}
            })
        );
    }

    #[test]
    fn test_range_filter_and_fields() {
        let options = ExportOptions::default()
            .with_fields(vec![FieldPath::parse("geo.cc")])
            .with_ranges(&["8.0.0.0/8", "1.2.3.128/25"])
            .unwrap();
        let out = export(&db(), &options).unwrap();
        assert_eq!(
            Value::Object(out.records),
            json!({
                "1.2.3.0/24": {"geo.cc": "DE"},
                "8.8.8.8/32": {"geo.cc": "US"}
            })
        );
    }

    #[test]
    fn test_invalid_range_is_an_error() {
        assert!(ExportOptions::default().with_ranges(&["8.8.8.8"]).is_err());
    }
}
