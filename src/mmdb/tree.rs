//! MMDB Search Tree Traversal
//!
//! Implements binary search tree traversal for IP address lookups and for
//! enumerating every stored network.
//! Each node contains two records (left and right) that point to either:
//! - Another node (continue traversal)
//! - A data section offset (found)
//! - A "not found" marker

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};

use super::format::MmdbHeader;
use super::types::{IpVersion, MmdbError, RecordSize, DATA_SECTION_SEPARATOR_SIZE};

/// Result of an IP lookup
#[derive(Debug, Clone, PartialEq)]
pub struct LookupResult {
    /// Offset into the data section (relative to data section start)
    pub data_offset: u32,
    /// Network prefix length, in the address family that was looked up
    pub prefix_len: u8,
}

/// What a record value refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    /// Index of another node
    Node(u32),
    /// No data for this branch
    Empty,
    /// Offset into the data section
    Data(u32),
}

/// Search tree for IP address lookups
#[derive(Clone, Copy)]
pub struct SearchTree<'a> {
    /// The raw file data containing the tree
    data: &'a [u8],
    /// Parsed header information
    header: &'a MmdbHeader,
}

impl<'a> SearchTree<'a> {
    /// Create a new search tree
    pub fn new(data: &'a [u8], header: &'a MmdbHeader) -> Self {
        Self { data, header }
    }

    /// Look up an IP address
    pub fn lookup(&self, ip: IpAddr) -> Result<Option<LookupResult>, MmdbError> {
        let (bits, bit_count, ipv4_in_ipv6) = match (ip, self.header.ip_version) {
            (IpAddr::V4(addr), IpVersion::V4) => (u128::from(u32::from(addr)), 32u8, false),
            (IpAddr::V4(addr), IpVersion::V6) => (u128::from(u32::from(addr)), 128u8, true),
            (IpAddr::V6(addr), IpVersion::V6) => (u128::from(addr), 128u8, false),
            (IpAddr::V6(addr), IpVersion::V4) => {
                return Err(MmdbError::LookupError(format!(
                    "you attempted to look up an IPv6 address ({}) in an IPv4-only database",
                    addr
                )))
            }
        };

        let mut node = 0u32;
        for bit_index in 0..bit_count {
            let bit = ((bits >> (bit_count - 1 - bit_index)) & 1) as u8;
            match self.classify(self.read_record(node, bit)?)? {
                Record::Node(next) => node = next,
                Record::Empty => return Ok(None),
                Record::Data(data_offset) => {
                    let depth = bit_index + 1;
                    // IPv4 prefixes are reported relative to the ::/96 subtree
                    let prefix_len = if ipv4_in_ipv6 {
                        depth.saturating_sub(96)
                    } else {
                        depth
                    };
                    return Ok(Some(LookupResult {
                        data_offset,
                        prefix_len,
                    }));
                }
            }
        }

        Err(MmdbError::InvalidFormat(format!(
            "search tree is deeper than {} bits",
            bit_count
        )))
    }

    /// Interpret a raw record value
    pub fn classify(&self, record: u32) -> Result<Record, MmdbError> {
        let node_count = self.header.node_count;
        if record < node_count {
            Ok(Record::Node(record))
        } else if record == node_count {
            Ok(Record::Empty)
        } else {
            self.calculate_data_offset(record).map(Record::Data)
        }
    }

    /// Read a record from a node
    ///
    /// Each node contains two records. `side` determines which:
    /// - 0 = left record (for IP bit 0)
    /// - 1 = right record (for IP bit 1)
    pub fn read_record(&self, node: u32, side: u8) -> Result<u32, MmdbError> {
        if node >= self.header.node_count {
            return Err(MmdbError::InvalidFormat(format!(
                "Node index {} exceeds node count {}",
                node, self.header.node_count
            )));
        }

        let node_bytes = self.header.record_size.node_bytes();
        let offset = node as usize * node_bytes;
        let bytes = self
            .data
            .get(offset..offset + node_bytes)
            .filter(|_| offset + node_bytes <= self.header.tree_size)
            .ok_or_else(|| {
                MmdbError::InvalidFormat(format!(
                    "Node offset {} exceeds tree size {}",
                    offset, self.header.tree_size
                ))
            })?;

        Ok(match self.header.record_size {
            RecordSize::Bits24 => read_24bit_record(bytes, side),
            RecordSize::Bits28 => read_28bit_record(bytes, side),
            RecordSize::Bits32 => read_32bit_record(bytes, side),
        })
    }

    /// Calculate data section offset from record value
    ///
    /// Record values above node_count point past the 16-byte separator:
    /// data_offset = (record_value - node_count) - 16
    fn calculate_data_offset(&self, record: u32) -> Result<u32, MmdbError> {
        let offset = record
            .checked_sub(self.header.node_count)
            .and_then(|v| v.checked_sub(DATA_SECTION_SEPARATOR_SIZE as u32))
            .ok_or_else(|| {
                MmdbError::InvalidFormat(format!(
                    "Record {} points into the data section separator (node_count = {})",
                    record, self.header.node_count
                ))
            })?;

        let data_len = self.header.data_section_end - self.header.data_section_start;
        if offset as usize >= data_len {
            return Err(MmdbError::InvalidFormat(format!(
                "Record {} points past the data section ({} >= {})",
                record, offset, data_len
            )));
        }
        Ok(offset)
    }

    /// Find the node where IPv4 addresses start in an IPv6 tree
    ///
    /// Follows 96 zero bits from the root. Returns `None` for IPv4 trees and
    /// when the ::/96 branch ends before reaching depth 96.
    pub fn ipv4_start_node(&self) -> Result<Option<u32>, MmdbError> {
        if self.header.ip_version == IpVersion::V4 || self.header.node_count == 0 {
            return Ok(None);
        }

        let mut node = 0u32;
        for _ in 0..96 {
            match self.classify(self.read_record(node, 0)?)? {
                Record::Node(next) => node = next,
                Record::Empty | Record::Data(_) => return Ok(None),
            }
        }
        Ok(Some(node))
    }

    /// Iterate over every (network, data offset) pair in address order
    ///
    /// Edges that alias the IPv4 subtree from elsewhere in an IPv6 tree
    /// (::ffff:0:0/96, 2002::/16) are not followed, so each IPv4 network is
    /// reported once.
    pub fn networks(&self) -> NetworkIter<'a> {
        let (ipv4_start, pending_error) = match self.ipv4_start_node() {
            Ok(node) => (node, None),
            Err(e) => (None, Some(e)),
        };

        let mut stack = Vec::new();
        if self.header.node_count > 0 {
            stack.push(Frame {
                record: Record::Node(0),
                bits: 0,
                depth: 0,
            });
        }

        NetworkIter {
            tree: *self,
            stack,
            ipv4_start,
            pending_error,
        }
    }
}

fn read_24bit_record(bytes: &[u8], side: u8) -> u32 {
    let b = if side == 0 { &bytes[0..3] } else { &bytes[3..6] };
    (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2])
}

/// Layout: [Left 24 bits][Middle 8 bits][Right 24 bits]
/// Middle byte contains 4 high bits of left + 4 high bits of right
fn read_28bit_record(bytes: &[u8], side: u8) -> u32 {
    let (high, low) = if side == 0 {
        (u32::from(bytes[3] >> 4), &bytes[0..3])
    } else {
        (u32::from(bytes[3] & 0x0F), &bytes[4..7])
    };
    (high << 24) | (u32::from(low[0]) << 16) | (u32::from(low[1]) << 8) | u32::from(low[2])
}

fn read_32bit_record(bytes: &[u8], side: u8) -> u32 {
    let b = if side == 0 { &bytes[0..4] } else { &bytes[4..8] };
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

struct Frame {
    record: Record,
    bits: u128,
    depth: u8,
}

/// Depth-first iterator over the networks of a search tree
pub struct NetworkIter<'a> {
    tree: SearchTree<'a>,
    stack: Vec<Frame>,
    ipv4_start: Option<u32>,
    pending_error: Option<MmdbError>,
}

impl NetworkIter<'_> {
    fn network(&self, bits: u128, depth: u8) -> Result<IpNetwork, MmdbError> {
        let net = match self.tree.header.ip_version {
            IpVersion::V4 => Ipv4Network::new(Ipv4Addr::from(bits as u32), depth).map(IpNetwork::V4),
            IpVersion::V6 if depth >= 96 && bits >> 32 == 0 => {
                Ipv4Network::new(Ipv4Addr::from(bits as u32), depth - 96).map(IpNetwork::V4)
            }
            IpVersion::V6 => Ipv6Network::new(Ipv6Addr::from(bits), depth).map(IpNetwork::V6),
        };
        net.map_err(|e| MmdbError::InvalidFormat(format!("bad network at depth {}: {}", depth, e)))
    }
}

impl Iterator for NetworkIter<'_> {
    type Item = Result<(IpNetwork, u32), MmdbError>;

    /// A structural error ends the iteration
    fn next(&mut self) -> Option<Self::Item> {
        let item = self.advance();
        if matches!(item, Some(Err(_))) {
            self.stack.clear();
        }
        item
    }
}

impl NetworkIter<'_> {
    fn advance(&mut self) -> Option<Result<(IpNetwork, u32), MmdbError>> {
        if let Some(err) = self.pending_error.take() {
            return Some(Err(err));
        }

        let bit_count = self.tree.header.ip_version.bit_count();

        while let Some(frame) = self.stack.pop() {
            match frame.record {
                Record::Empty => continue,
                Record::Data(offset) => {
                    return Some(self.network(frame.bits, frame.depth).map(|net| (net, offset)));
                }
                Record::Node(node) => {
                    let is_ipv4_root_path = frame.bits == 0 && frame.depth == 96;
                    if self.ipv4_start == Some(node) && !is_ipv4_root_path {
                        continue;
                    }
                    if frame.depth >= bit_count {
                        return Some(Err(MmdbError::InvalidFormat(format!(
                            "node {} lies deeper than {} bits",
                            node, bit_count
                        ))));
                    }

                    let children = self
                        .tree
                        .read_record(node, 0)
                        .and_then(|r| self.tree.classify(r))
                        .and_then(|left| {
                            self.tree
                                .read_record(node, 1)
                                .and_then(|r| self.tree.classify(r))
                                .map(|right| (left, right))
                        });

                    let (left, right) = match children {
                        Ok(pair) => pair,
                        Err(e) => return Some(Err(e)),
                    };

                    let depth = frame.depth + 1;
                    let right_bits = frame.bits | (1u128 << (bit_count - depth));
                    // Right first so the left (lower) half is visited first
                    self.stack.push(Frame {
                        record: right,
                        bits: right_bits,
                        depth,
                    });
                    self.stack.push(Frame {
                        record: left,
                        bits: frame.bits,
                        depth,
                    });
                }
            }
        }

        None
    }
}
