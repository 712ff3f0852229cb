//! mmdbio - JSON to MaxMind DB and back
//!
//! mmdbio moves network-indexed data (threat intelligence, geolocation,
//! ownership) between a human-editable JSON document and a MaxMind DB
//! (MMDB) file built for fast IP lookups.
//!
//! # Quick Start
//!
//! ```rust
//! use mmdbio::{import_document, Database, WriterOptions};
//! use serde_json::json;
//!
//! let document = json!({
//!     "1.2.3.0/24": {"is_proxy": "true", "threat_score": 90},
//!     "10.0.0.1-10.0.0.9": {"owner": "lab"}
//! });
//!
//! let outcome = import_document(&document, &WriterOptions::default(), "inline")?;
//! assert_eq!(outcome.inserted, 2);
//!
//! let db = Database::from_bytes(outcome.database)?;
//! let record = db.lookup("1.2.3.4".parse()?)?;
//! assert!(record.is_some());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! JSON document ──► key_resolver ─┐
//!                  convert ───────┴─► writer ─► tree_builder + data_section ─► .mmdb
//!
//! .mmdb ─► database (mmap) ─► compare / projection / schema / verify
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Snapshot and diff of two databases
pub mod compare;
/// JSON values to storable values
pub mod convert;
/// Data section encoding/decoding
pub mod data_section;
/// Database reader
pub mod database;
/// Error types
pub mod error;
/// Database to JSON document
pub mod export;
/// Plain, gzip and stdin input
pub mod file_reader;
/// Document import
pub mod import;
/// Decoded values as JSON
pub mod json;
/// Network key classification
pub mod key_resolver;
/// Merge strategies for overlapping inserts
pub mod merge;
/// MMDB file format
pub mod mmdb;
/// Address arithmetic
pub mod network;
/// Field paths and batch lookups
pub mod projection;
/// Record schema inference
pub mod schema;
/// Search tree construction
pub mod tree_builder;
/// Database integrity checks
pub mod verify;
/// Database serialization
pub mod writer;

pub use crate::compare::{diff, DatabaseDiff, Snapshot};
pub use crate::convert::{convert, StorableValue};
pub use crate::data_section::DataValue;
pub use crate::database::{Database, NetworkRecord};
pub use crate::error::{MmdbioError, Result};
pub use crate::export::{export, ExportOptions, ExportOutcome};
pub use crate::import::{import_document, import_json, ImportOutcome, SkippedEntry};
pub use crate::key_resolver::{resolve, InsertionPlan, SkipReason};
pub use crate::merge::MergeStrategy;
pub use crate::mmdb::{IpVersion, Metadata, MmdbError, RecordSize};
pub use crate::projection::FieldPath;
pub use crate::writer::{DatabaseWriter, WriterOptions};

/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
        assert!(VERSION.starts_with("0."));
    }
}
