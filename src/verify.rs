//! Database integrity verification
//!
//! Checks that a file is a well-formed MMDB database without trusting any
//! of its offsets:
//!
//! - metadata marker, required metadata fields and their types
//! - binary format major version 2, record size and IP version
//! - the search tree fits before the metadata and is followed by the
//!   16-byte zero separator
//! - every reachable node index is in range and no node is reached twice
//!   (apart from the IPv4 subtree, which alias edges share)
//! - every data record the tree points at decodes
//!
//! # Usage
//!
//! ```rust,no_run
//! use mmdbio::verify::verify_file;
//!
//! let report = verify_file("database.mmdb")?;
//! if report.is_valid() {
//!     println!("valid");
//! } else {
//!     for error in &report.errors {
//!         println!("  - {}", error);
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::path::Path;

use log::debug;
use rustc_hash::FxHashSet;

use crate::data_section::DataDecoder;
use crate::error::Result;
use crate::mmdb::{
    find_metadata_marker, Metadata, MmdbHeader, Record, SearchTree, DATA_SECTION_SEPARATOR_SIZE,
};

/// Verification report with detailed findings
#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    /// Problems that make the database unusable
    pub errors: Vec<String>,
    /// Oddities that do not affect lookups
    pub warnings: Vec<String>,
    /// Informational messages about database properties
    pub info: Vec<String>,
    /// Numbers gathered while verifying
    pub stats: VerifyStats,
}

/// Statistics gathered during verification
#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyStats {
    /// File size in bytes
    pub file_size: usize,
    /// Node count from metadata
    pub node_count: u32,
    /// Nodes reached from the root
    pub nodes_visited: usize,
    /// Distinct data records decoded
    pub data_records: usize,
}

impl VerifyReport {
    /// Check if database passed all checks (no errors)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// The first error found, if any
    pub fn first_error(&self) -> Option<&str> {
        self.errors.first().map(String::as_str)
    }

    fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn info(&mut self, msg: impl Into<String>) {
        self.info.push(msg.into());
    }
}

/// Read and verify a database file
pub fn verify_file(path: impl AsRef<Path>) -> Result<VerifyReport> {
    let buffer = std::fs::read(path.as_ref())?;
    Ok(verify_bytes(&buffer))
}

/// Verify a database held in memory
pub fn verify_bytes(buffer: &[u8]) -> VerifyReport {
    let mut report = VerifyReport {
        stats: VerifyStats {
            file_size: buffer.len(),
            ..VerifyStats::default()
        },
        ..VerifyReport::default()
    };

    if let Err(e) = find_metadata_marker(buffer) {
        report.error(e.to_string());
        return report;
    }

    let metadata = match Metadata::from_file(buffer) {
        Ok(m) => m,
        Err(e) => {
            report.error(e.to_string());
            return report;
        }
    };
    report.stats.node_count = metadata.node_count;
    report.info(format!(
        "{} (IPv{}, {}-bit records, {} nodes)",
        metadata.database_type,
        metadata.ip_version.number(),
        metadata.record_size.bits(),
        metadata.node_count
    ));

    let header = match MmdbHeader::from_metadata(buffer, &metadata) {
        Ok(h) => h,
        Err(e) => {
            report.error(e.to_string());
            return report;
        }
    };

    let separator = &buffer[header.tree_size..header.data_section_start];
    if separator.iter().any(|b| *b != 0) {
        report.error(format!(
            "the {} bytes after the search tree are not all zero",
            DATA_SECTION_SEPARATOR_SIZE
        ));
        return report;
    }

    let tree = SearchTree::new(buffer, &header);
    let data_offsets = match walk_tree(&tree, &header, &mut report) {
        Some(offsets) => offsets,
        None => return report,
    };

    let data_section = &buffer[header.data_section_start..header.data_section_end];
    let decoder = DataDecoder::new(data_section);
    let mut offsets: Vec<u32> = data_offsets.into_iter().collect();
    offsets.sort_unstable();
    for offset in offsets {
        if let Err(e) = decoder.decode(offset) {
            report.error(format!("data record at offset {}: {}", offset, e));
            return report;
        }
        report.stats.data_records += 1;
    }

    report.info(format!(
        "{} nodes visited, {} data records decoded",
        report.stats.nodes_visited, report.stats.data_records
    ));
    debug!("verified {} bytes", buffer.len());
    report
}

/// Depth-first walk from the root; returns the distinct data offsets, or
/// `None` after recording a structural error
fn walk_tree(
    tree: &SearchTree<'_>,
    header: &MmdbHeader,
    report: &mut VerifyReport,
) -> Option<FxHashSet<u32>> {
    let mut data_offsets = FxHashSet::default();
    if header.node_count == 0 {
        report.warning("search tree has no nodes");
        return Some(data_offsets);
    }

    let ipv4_start = match tree.ipv4_start_node() {
        Ok(node) => node,
        Err(e) => {
            report.error(e.to_string());
            return None;
        }
    };

    let max_depth = header.ip_version.bit_count();
    let mut visited: FxHashSet<u32> = FxHashSet::default();
    let mut stack = vec![(0u32, 0u8)];

    while let Some((node, depth)) = stack.pop() {
        if !visited.insert(node) {
            if Some(node) == ipv4_start {
                continue;
            }
            report.error(format!("node {} is reachable along more than one path", node));
            return None;
        }
        if depth >= max_depth {
            report.error(format!(
                "node {} lies deeper than {} bits",
                node, max_depth
            ));
            return None;
        }

        for side in 0..2u8 {
            let record = match tree.read_record(node, side).and_then(|r| tree.classify(r)) {
                Ok(record) => record,
                Err(e) => {
                    report.error(e.to_string());
                    return None;
                }
            };
            match record {
                Record::Node(next) => stack.push((next, depth + 1)),
                Record::Data(offset) => {
                    data_offsets.insert(offset);
                }
                Record::Empty => {}
            }
        }
    }

    report.stats.nodes_visited = visited.len();
    let orphaned = (header.node_count as usize).saturating_sub(visited.len());
    if orphaned > 0 {
        report.warning(format!(
            "{} nodes are unreachable from the root",
            orphaned
        ));
    }
    Some(data_offsets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_section::DataValue;
    use crate::mmdb::RecordSize;
    use crate::writer::{DatabaseWriter, WriterOptions};

    fn build(options: WriterOptions) -> Vec<u8> {
        let mut writer = DatabaseWriter::new(options.with_build_epoch(7)).unwrap();
        writer
            .insert_network("1.2.3.0/24".parse().unwrap(), &DataValue::String("x".into()))
            .unwrap();
        writer
            .insert_network("2001:db8::/48".parse().unwrap(), &DataValue::Uint32(9))
            .unwrap();
        writer.build().unwrap()
    }

    #[test]
    fn test_written_databases_verify() {
        for bits in [24u16, 28, 32] {
            let options = WriterOptions::default()
                .with_record_size(RecordSize::from_bits(bits).unwrap());
            let report = verify_bytes(&build(options));
            assert!(report.is_valid(), "{} bits: {:?}", bits, report.errors);
            assert_eq!(report.stats.data_records, 2);
            assert!(report.warnings.is_empty());
        }
    }

    #[test]
    fn test_aliased_database_verifies() {
        let report = verify_bytes(&build(WriterOptions::default().with_ipv4_aliasing(true)));
        assert!(report.is_valid(), "{:?}", report.errors);
    }

    #[test]
    fn test_empty_file() {
        let report = verify_bytes(&[]);
        assert!(!report.is_valid());
        assert_eq!(report.first_error(), Some("MMDB metadata marker not found"));
    }

    #[test]
    fn test_corrupt_separator() {
        let mut bytes = build(WriterOptions::default());
        let header = MmdbHeader::from_file(&bytes).unwrap();
        bytes[header.tree_size + 3] = 0xFF;
        let report = verify_bytes(&bytes);
        assert!(!report.is_valid());
        assert!(report.first_error().unwrap().contains("not all zero"));
    }

    #[test]
    fn test_corrupt_tree_record() {
        let mut bytes = build(WriterOptions::default());
        // Point the root's left record far past the data section
        bytes[0..4].copy_from_slice(&u32::MAX.to_be_bytes());
        let report = verify_bytes(&bytes);
        assert!(!report.is_valid());
    }

    #[test]
    fn test_corrupt_data_record() {
        let mut bytes = build(WriterOptions::default());
        let header = MmdbHeader::from_file(&bytes).unwrap();
        // Overwrite every data byte with a pointer-to-pointer control byte
        for b in &mut bytes[header.data_section_start..header.data_section_end] {
            *b = 0x20;
        }
        let report = verify_bytes(&bytes);
        assert!(!report.is_valid());
        assert!(report.first_error().unwrap().starts_with("data record"));
    }

    #[test]
    fn test_verify_file_missing() {
        assert!(verify_file("/nonexistent/file.mmdb").is_err());
    }
}
