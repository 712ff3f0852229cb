//! Error types for the mmdbio library

use thiserror::Error;

use crate::mmdb::MmdbError;

/// Result type alias for mmdbio operations
pub type Result<T> = std::result::Result<T, MmdbioError>;

/// Main error type for mmdbio operations
#[derive(Debug, Error)]
pub enum MmdbioError {
    /// Unsupported address family, record width or merge strategy
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Network outside the tree's address family or otherwise unusable
    #[error("Invalid network: {0}")]
    InvalidNetwork(String),

    /// Insert into a network excluded as reserved
    #[error("cannot insert into {0}: network is reserved")]
    ReservedNetwork(String),

    /// Insert into a network that aliases the IPv4 subtree
    #[error("cannot insert into {0}: network is an alias of the IPv4 tree")]
    AliasedNetwork(String),

    /// Input document is not usable (wrong shape, unreadable JSON)
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Input document has no entries at all
    #[error("no records found in {0}")]
    EmptyDocument(String),

    /// Every entry of a non-empty document was skipped
    #[error("no entries were inserted ({skipped} skipped)")]
    NothingInserted {
        /// Number of skipped entries
        skipped: usize,
    },

    /// Tree serialization failed (e.g. record width too small)
    #[error("Build error: {0}")]
    Build(String),

    /// Reading or decoding a database failed
    #[error(transparent)]
    Mmdb(#[from] MmdbError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parse errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
