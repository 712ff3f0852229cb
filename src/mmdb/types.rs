//! MMDB-specific Type Definitions
//!
//! Data values use the `DataValue` type from the `data_section` module.

use thiserror::Error;

/// MMDB metadata marker: "\xAB\xCD\xEFMaxMind.com"
pub const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

/// Size of the zero separator between the search tree and the data section
pub const DATA_SECTION_SEPARATOR_SIZE: usize = 16;

/// MMDB-specific error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MmdbError {
    /// Invalid file format
    #[error("Invalid MMDB format: {0}")]
    InvalidFormat(String),
    /// Metadata not found
    #[error("MMDB metadata marker not found")]
    MetadataNotFound,
    /// Invalid metadata structure
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),
    /// Data decoding error
    #[error("Data decode error: {0}")]
    DecodeError(String),
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),
    /// Invalid IP address
    #[error("Invalid IP address: {0}")]
    InvalidIpAddress(String),
    /// Network/IP lookup error
    #[error("Lookup error: {0}")]
    LookupError(String),
}

impl From<std::io::Error> for MmdbError {
    fn from(err: std::io::Error) -> Self {
        MmdbError::IoError(err.to_string())
    }
}

/// IP version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    /// IPv4 only
    V4,
    /// IPv6 (IPv4 lives under ::/96)
    V6,
}

impl IpVersion {
    /// Parse the numeric form used by metadata and the command line
    pub fn from_number(n: u64) -> Result<Self, MmdbError> {
        match n {
            4 => Ok(IpVersion::V4),
            6 => Ok(IpVersion::V6),
            _ => Err(MmdbError::InvalidMetadata(format!(
                "Invalid IP version: {}",
                n
            ))),
        }
    }

    /// Numeric form (4 or 6)
    pub fn number(self) -> u16 {
        match self {
            IpVersion::V4 => 4,
            IpVersion::V6 => 6,
        }
    }

    /// Depth of the search tree in bits
    pub fn bit_count(self) -> u8 {
        match self {
            IpVersion::V4 => 32,
            IpVersion::V6 => 128,
        }
    }
}

/// Record size in bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSize {
    /// 24-bit records (3 bytes per record, 6 bytes per node)
    Bits24 = 24,
    /// 28-bit records (3.5 bytes per record, 7 bytes per node)
    Bits28 = 28,
    /// 32-bit records (4 bytes per record, 8 bytes per node)
    Bits32 = 32,
}

impl RecordSize {
    /// Get the size of a node (2 records) in bytes
    pub fn node_bytes(self) -> usize {
        match self {
            RecordSize::Bits24 => 6,
            RecordSize::Bits28 => 7,
            RecordSize::Bits32 => 8,
        }
    }

    /// Width in bits
    pub fn bits(self) -> u16 {
        self as u16
    }

    /// Largest value a single record can hold
    pub fn max_value(self) -> u64 {
        (1u64 << self.bits()) - 1
    }

    /// Create from bit size
    pub fn from_bits(bits: u16) -> Result<Self, MmdbError> {
        match bits {
            24 => Ok(RecordSize::Bits24),
            28 => Ok(RecordSize::Bits28),
            32 => Ok(RecordSize::Bits32),
            _ => Err(MmdbError::InvalidFormat(format!(
                "Invalid record size: {} bits",
                bits
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_size_from_bits() {
        assert_eq!(RecordSize::from_bits(28).unwrap(), RecordSize::Bits28);
        assert_eq!(RecordSize::Bits28.node_bytes(), 7);
        assert_eq!(RecordSize::Bits24.max_value(), 0xFF_FFFF);
        assert!(RecordSize::from_bits(16).is_err());
    }

    #[test]
    fn test_ip_version_from_number() {
        assert_eq!(IpVersion::from_number(4).unwrap(), IpVersion::V4);
        assert_eq!(IpVersion::from_number(6).unwrap().bit_count(), 128);
        assert!(IpVersion::from_number(5).is_err());
    }
}
