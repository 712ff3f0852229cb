//! MMDB Binary Format Parsing
//!
//! Handles the pieces of the file outside the search tree: locating the
//! metadata marker, decoding the metadata map and computing where the tree
//! and data section live.

use std::collections::{BTreeMap, HashMap};

use super::types::{IpVersion, MmdbError, RecordSize, DATA_SECTION_SEPARATOR_SIZE, METADATA_MARKER};
use crate::data_section::{DataDecoder, DataEncoder, DataValue};

/// The marker must appear within this many bytes of the end of the file
const METADATA_SEARCH_SIZE: usize = 128 * 1024;

/// MMDB file header
///
/// Contains only the essential information needed for IP lookups.
#[derive(Debug, Clone, Copy)]
pub struct MmdbHeader {
    /// Number of nodes in the search tree
    pub node_count: u32,
    /// Record size in bits (24, 28, or 32)
    pub record_size: RecordSize,
    /// IP version (4 or 6)
    pub ip_version: IpVersion,
    /// Size of the search tree in bytes
    pub tree_size: usize,
    /// Offset of the first data section byte
    pub data_section_start: usize,
    /// Offset of the metadata marker (end of the data section)
    pub data_section_end: usize,
}

impl MmdbHeader {
    /// Parse MMDB file and extract header information
    pub fn from_file(data: &[u8]) -> Result<Self, MmdbError> {
        let metadata = Metadata::from_file(data)?;
        Self::from_metadata(data, &metadata)
    }

    /// Compute section boundaries from already-parsed metadata
    pub fn from_metadata(data: &[u8], metadata: &Metadata) -> Result<Self, MmdbError> {
        let marker_offset = find_metadata_marker(data)?;
        let tree_size = metadata.node_count as usize * metadata.record_size.node_bytes();
        let data_section_start = tree_size + DATA_SECTION_SEPARATOR_SIZE;

        if data_section_start > marker_offset {
            return Err(MmdbError::InvalidFormat(format!(
                "search tree of {} bytes does not fit before metadata at offset {}",
                tree_size, marker_offset
            )));
        }

        Ok(MmdbHeader {
            node_count: metadata.node_count,
            record_size: metadata.record_size,
            ip_version: metadata.ip_version,
            tree_size,
            data_section_start,
            data_section_end: marker_offset,
        })
    }
}

/// Database metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    /// Number of nodes in the search tree
    pub node_count: u32,
    /// Record width
    pub record_size: RecordSize,
    /// Address family of the tree
    pub ip_version: IpVersion,
    /// Free-form database type (title)
    pub database_type: String,
    /// Locales the descriptions are written in
    pub languages: Vec<String>,
    /// Language code -> description
    pub description: BTreeMap<String, String>,
    /// Always 2
    pub binary_format_major_version: u16,
    /// Always 0
    pub binary_format_minor_version: u16,
    /// Build time in seconds since the Unix epoch
    pub build_epoch: u64,
}

impl Metadata {
    /// Locate and decode metadata from a whole file
    pub fn from_file(data: &[u8]) -> Result<Self, MmdbError> {
        let marker_offset = find_metadata_marker(data)?;
        let metadata_bytes = &data[marker_offset + METADATA_MARKER.len()..];
        let value = DataDecoder::new(metadata_bytes)
            .decode(0)
            .map_err(|e| MmdbError::InvalidMetadata(format!("Failed to decode metadata: {}", e)))?;
        Self::from_value(&value)
    }

    /// Interpret a decoded metadata map
    pub fn from_value(value: &DataValue) -> Result<Self, MmdbError> {
        let map = value
            .as_map()
            .ok_or_else(|| MmdbError::InvalidMetadata("Metadata is not a map".to_string()))?;

        let node_count = u32::try_from(extract_uint(map, "node_count")?).map_err(|_| {
            MmdbError::InvalidMetadata("node_count does not fit in 32 bits".to_string())
        })?;
        let record_size_bits = u16::try_from(extract_uint(map, "record_size")?).map_err(|_| {
            MmdbError::InvalidMetadata("record_size out of range".to_string())
        })?;
        let record_size = RecordSize::from_bits(record_size_bits)
            .map_err(|e| MmdbError::InvalidMetadata(e.to_string()))?;
        let ip_version = IpVersion::from_number(extract_uint(map, "ip_version")?)?;

        let major = extract_uint(map, "binary_format_major_version")?;
        if major != 2 {
            return Err(MmdbError::InvalidMetadata(format!(
                "Unsupported binary format major version {}",
                major
            )));
        }
        let minor = extract_uint(map, "binary_format_minor_version")?;

        let database_type = map
            .get("database_type")
            .and_then(DataValue::as_str)
            .ok_or_else(|| {
                MmdbError::InvalidMetadata("Required field 'database_type' not found".to_string())
            })?
            .to_string();

        let build_epoch = extract_uint(map, "build_epoch")?;

        let languages = match map.get("languages") {
            None => Vec::new(),
            Some(DataValue::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        MmdbError::InvalidMetadata("languages must be strings".to_string())
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(MmdbError::InvalidMetadata(
                    "Field 'languages' is not an array".to_string(),
                ))
            }
        };

        let description = match map.get("description") {
            None => BTreeMap::new(),
            Some(DataValue::Map(entries)) => entries
                .iter()
                .map(|(lang, text)| {
                    text.as_str()
                        .map(|t| (lang.clone(), t.to_string()))
                        .ok_or_else(|| {
                            MmdbError::InvalidMetadata("descriptions must be strings".to_string())
                        })
                })
                .collect::<Result<BTreeMap<_, _>, _>>()?,
            Some(_) => {
                return Err(MmdbError::InvalidMetadata(
                    "Field 'description' is not a map".to_string(),
                ))
            }
        };

        Ok(Metadata {
            node_count,
            record_size,
            ip_version,
            database_type,
            languages,
            description,
            binary_format_major_version: major as u16,
            binary_format_minor_version: minor as u16,
            build_epoch,
        })
    }

    /// Metadata as the map written after the marker
    pub fn to_value(&self) -> DataValue {
        let mut map = HashMap::new();
        map.insert("node_count".to_string(), DataValue::Uint32(self.node_count));
        map.insert(
            "record_size".to_string(),
            DataValue::Uint16(self.record_size.bits()),
        );
        map.insert(
            "ip_version".to_string(),
            DataValue::Uint16(self.ip_version.number()),
        );
        map.insert(
            "database_type".to_string(),
            DataValue::String(self.database_type.clone()),
        );
        map.insert(
            "languages".to_string(),
            DataValue::Array(
                self.languages
                    .iter()
                    .map(|l| DataValue::String(l.clone()))
                    .collect(),
            ),
        );
        map.insert(
            "description".to_string(),
            DataValue::Map(
                self.description
                    .iter()
                    .map(|(k, v)| (k.clone(), DataValue::String(v.clone())))
                    .collect(),
            ),
        );
        map.insert(
            "binary_format_major_version".to_string(),
            DataValue::Uint16(self.binary_format_major_version),
        );
        map.insert(
            "binary_format_minor_version".to_string(),
            DataValue::Uint16(self.binary_format_minor_version),
        );
        map.insert("build_epoch".to_string(), DataValue::Uint64(self.build_epoch));
        DataValue::Map(map)
    }

    /// Marker followed by the encoded metadata map
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = METADATA_MARKER.to_vec();
        out.extend(DataEncoder::encode_standalone(&self.to_value()));
        out
    }
}

/// Find the metadata marker in an MMDB file
///
/// The marker "\xAB\xCD\xEFMaxMind.com" appears somewhere in the last 128KB
/// of the file and the metadata comes after it. If there are several
/// occurrences the last one wins.
pub fn find_metadata_marker(data: &[u8]) -> Result<usize, MmdbError> {
    let search_start = data.len().saturating_sub(METADATA_SEARCH_SIZE);
    memchr::memmem::rfind(&data[search_start..], METADATA_MARKER)
        .map(|pos| search_start + pos)
        .ok_or(MmdbError::MetadataNotFound)
}

fn extract_uint(map: &HashMap<String, DataValue>, key: &str) -> Result<u64, MmdbError> {
    match map.get(key) {
        Some(DataValue::Uint16(n)) => Ok(u64::from(*n)),
        Some(DataValue::Uint32(n)) => Ok(u64::from(*n)),
        Some(DataValue::Uint64(n)) => Ok(*n),
        Some(_) => Err(MmdbError::InvalidMetadata(format!(
            "Field '{}' is not an unsigned integer",
            key
        ))),
        None => Err(MmdbError::InvalidMetadata(format!(
            "Required field '{}' not found",
            key
        ))),
    }
}
