//! MaxMind DB (MMDB) Reader
//!
//! The MMDB format uses a binary search tree for efficient IP address
//! lookups. Data is stored in the MMDB data section format, handled by
//! `crate::data_section`.
//!
//! ## Architecture
//!
//! - **types**: MMDB-specific types and constants
//! - **format**: Metadata extraction and section boundaries
//! - **tree**: Search tree traversal for lookups and network iteration

pub mod format;
pub mod tree;
pub mod types;

pub use format::{find_metadata_marker, Metadata, MmdbHeader};
pub use tree::{LookupResult, NetworkIter, Record, SearchTree};
pub use types::{IpVersion, MmdbError, RecordSize, DATA_SECTION_SEPARATOR_SIZE, METADATA_MARKER};
