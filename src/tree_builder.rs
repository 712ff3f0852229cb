//! IP Tree Builder for MMDB Format
//!
//! Builds the binary search tree for IP address lookups following the MMDB
//! specification. Nodes live in an arena and point at each other by index;
//! values live in a separate arena so that overlapping inserts can merge
//! with whatever each covered branch already holds.
//!
//! IPv4 networks in an IPv6 tree are stored under `::/96`.

use std::collections::VecDeque;

use ipnetwork::IpNetwork;
use rustc_hash::FxHashMap;

use crate::data_section::{DataEncoder, DataValue};
use crate::error::{MmdbioError, Result};
use crate::merge::MergeStrategy;
use crate::mmdb::{IpVersion, RecordSize, DATA_SECTION_SEPARATOR_SIZE};
use crate::network::addr_to_u128;

/// Networks that alias the IPv4 subtree when aliasing is enabled
const IPV4_ALIASES: &[([u16; 8], u8)] = &[
    // IPv4-mapped ::ffff:0:0/96
    ([0, 0, 0, 0, 0, 0xffff, 0, 0], 96),
    // 6to4 2002::/16
    ([0x2002, 0, 0, 0, 0, 0, 0, 0], 16),
];

/// IP tree builder using arena allocation
pub struct TreeBuilder {
    /// Record size for the tree
    record_size: RecordSize,
    /// IP version (determines tree depth)
    ip_version: IpVersion,
    /// All nodes in the tree (arena); node 0 is the root
    nodes: Vec<Node>,
    /// Values referenced by `NodePointer::Data`
    values: Vec<DataValue>,
    /// Node reached by following 96 zero bits, when aliasing is on
    ipv4_root: Option<u32>,
}

/// A node in the IP tree
#[derive(Debug, Clone)]
struct Node {
    /// Left child (bit 0)
    left: NodePointer,
    /// Right child (bit 1)
    right: NodePointer,
}

impl Node {
    fn new_empty() -> Self {
        Self {
            left: NodePointer::Empty,
            right: NodePointer::Empty,
        }
    }
}

/// What one side of a node points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodePointer {
    /// Another node (arena index)
    Node(u32),
    /// A value (index into `values`)
    Data(u32),
    /// Not found marker
    Empty,
    /// Reserved network; written as empty and never filled
    Reserved,
    /// Points at the IPv4 subtree
    Alias,
}

/// Serialized tree plus the data section its records point into
#[derive(Debug)]
pub struct BuiltTree {
    /// Search tree bytes
    pub tree: Vec<u8>,
    /// Data section bytes (without the separator)
    pub data: Vec<u8>,
    /// Number of nodes in `tree`
    pub node_count: u32,
}

/// Per-insert state: the value being written and the merged values already
/// produced, so each distinct existing value is merged once
struct Cover<'a> {
    value: &'a DataValue,
    strategy: MergeStrategy,
    fresh: Option<u32>,
    merged: FxHashMap<u32, u32>,
}

impl TreeBuilder {
    /// Create a new tree builder
    pub fn new(ip_version: IpVersion, record_size: RecordSize) -> Self {
        Self {
            record_size,
            ip_version,
            nodes: vec![Node::new_empty()],
            values: Vec::new(),
            ipv4_root: None,
        }
    }

    /// Make IPv4-mapped (::ffff:0:0/96) and 6to4 (2002::/16) addresses
    /// resolve through the IPv4 subtree
    pub fn enable_ipv4_aliasing(&mut self) -> Result<()> {
        if self.ip_version != IpVersion::V6 {
            return Err(MmdbioError::Config(
                "IPv4 aliasing requires an IPv6 database".to_string(),
            ));
        }

        let mut node = 0u32;
        for _ in 0..96 {
            node = match self.child(node, 0) {
                NodePointer::Node(next) => next,
                _ => {
                    let next = self.allocate_node();
                    self.set_child(node, 0, NodePointer::Node(next));
                    next
                }
            };
        }
        self.ipv4_root = Some(node);

        for (segments, prefix) in IPV4_ALIASES {
            let bits = u128::from(std::net::Ipv6Addr::from(*segments));
            self.mark_edge(bits, *prefix, NodePointer::Alias);
        }
        Ok(())
    }

    /// Exclude a network from the tree; later inserts into it fail and
    /// inserts that cover it leave it empty
    pub fn reserve(&mut self, network: IpNetwork) -> Result<()> {
        let (bits, prefix) = self.position(network)?;
        if prefix == 0 {
            return Err(MmdbioError::InvalidNetwork(format!(
                "cannot reserve the whole address space ({})",
                network
            )));
        }
        self.mark_edge(bits, prefix, NodePointer::Reserved);
        Ok(())
    }

    /// Insert a value for a CIDR block, merging with covered values
    pub fn insert(
        &mut self,
        network: IpNetwork,
        value: &DataValue,
        strategy: MergeStrategy,
    ) -> Result<()> {
        let (bits, prefix) = self.position(network)?;
        let mut cover = Cover {
            value,
            strategy,
            fresh: None,
            merged: FxHashMap::default(),
        };

        if prefix == 0 {
            self.cover_edge(0, 0, &mut cover);
            self.cover_edge(0, 1, &mut cover);
            return Ok(());
        }

        let width = self.width();
        let mut node = 0u32;
        for depth in 0..prefix {
            let bit = ((bits >> (width - 1 - depth)) & 1) as u8;

            if depth + 1 == prefix {
                return match self.child(node, bit) {
                    NodePointer::Reserved => Err(MmdbioError::ReservedNetwork(network.to_string())),
                    NodePointer::Alias => Err(MmdbioError::AliasedNetwork(network.to_string())),
                    _ => {
                        self.cover_edge(node, bit, &mut cover);
                        Ok(())
                    }
                };
            }

            node = match self.child(node, bit) {
                NodePointer::Node(next) => next,
                NodePointer::Empty => {
                    let next = self.allocate_node();
                    self.set_child(node, bit, NodePointer::Node(next));
                    next
                }
                NodePointer::Data(existing) => {
                    // Split the existing leaf so the more specific insert
                    // can go below it
                    let next = self.allocate_node();
                    self.nodes[next as usize].left = NodePointer::Data(existing);
                    self.nodes[next as usize].right = NodePointer::Data(existing);
                    self.set_child(node, bit, NodePointer::Node(next));
                    next
                }
                NodePointer::Reserved => {
                    return Err(MmdbioError::ReservedNetwork(network.to_string()))
                }
                NodePointer::Alias => {
                    return Err(MmdbioError::AliasedNetwork(network.to_string()))
                }
            };
        }

        Ok(())
    }

    /// Number of nodes currently allocated
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Finalize: merge identical sibling leaves, renumber, encode values
    /// and serialize every node
    pub fn build(mut self) -> Result<BuiltTree> {
        self.collapse(0);

        // Breadth-first renumbering drops nodes orphaned by collapsing
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut new_index: Vec<Option<u32>> = vec![None; self.nodes.len()];
        let mut queue = VecDeque::from([0u32]);
        new_index[0] = Some(0);
        while let Some(id) = queue.pop_front() {
            order.push(id);
            let node = &self.nodes[id as usize];
            for ptr in [node.left, node.right] {
                if let NodePointer::Node(child) = ptr {
                    if new_index[child as usize].is_none() {
                        new_index[child as usize] = Some(order.len() as u32 + queue.len() as u32);
                        queue.push_back(child);
                    }
                }
            }
        }

        let node_count = order.len() as u32;
        let alias_target = match self.ipv4_root {
            Some(root) => new_index[root as usize],
            None => None,
        };

        let mut encoder = DataEncoder::new();
        let mut offsets: FxHashMap<u32, u32> = FxHashMap::default();
        let max_record = self.record_size.max_value();
        let node_bytes = self.record_size.node_bytes();
        let mut tree = vec![0u8; order.len() * node_bytes];

        for (position, id) in order.iter().enumerate() {
            let node = &self.nodes[*id as usize];
            let mut records = [0u64; 2];
            for (slot, ptr) in [node.left, node.right].into_iter().enumerate() {
                records[slot] = match ptr {
                    NodePointer::Empty | NodePointer::Reserved => u64::from(node_count),
                    NodePointer::Node(child) => new_index[child as usize]
                        .map(u64::from)
                        .ok_or_else(|| {
                            MmdbioError::Build(format!("node {} was not numbered", child))
                        })?,
                    NodePointer::Alias => alias_target.map(u64::from).ok_or_else(|| {
                        MmdbioError::Build("alias without an IPv4 subtree".to_string())
                    })?,
                    NodePointer::Data(vid) => {
                        let offset = match offsets.get(&vid) {
                            Some(offset) => *offset,
                            None => {
                                let offset = encoder.encode(&self.values[vid as usize]);
                                offsets.insert(vid, offset);
                                offset
                            }
                        };
                        u64::from(node_count)
                            + DATA_SECTION_SEPARATOR_SIZE as u64
                            + u64::from(offset)
                    }
                };
                if records[slot] > max_record {
                    return Err(MmdbioError::Build(format!(
                        "record value {} does not fit in {}-bit records; use a larger record size",
                        records[slot],
                        self.record_size.bits()
                    )));
                }
            }

            let out = &mut tree[position * node_bytes..(position + 1) * node_bytes];
            write_node(out, self.record_size, records[0] as u32, records[1] as u32);
        }

        Ok(BuiltTree {
            tree,
            data: encoder.into_bytes(),
            node_count,
        })
    }

    fn width(&self) -> u8 {
        self.ip_version.bit_count()
    }

    /// Integer address and prefix length of a network inside this tree
    fn position(&self, network: IpNetwork) -> Result<(u128, u8)> {
        let bits = addr_to_u128(network.network());
        match (network, self.ip_version) {
            (IpNetwork::V4(_), IpVersion::V4) => Ok((bits, network.prefix())),
            (IpNetwork::V4(_), IpVersion::V6) => Ok((bits, network.prefix() + 96)),
            (IpNetwork::V6(_), IpVersion::V6) => Ok((bits, network.prefix())),
            (IpNetwork::V6(_), IpVersion::V4) => Err(MmdbioError::InvalidNetwork(format!(
                "cannot insert IPv6 network {} into an IPv4-only tree",
                network
            ))),
        }
    }

    fn child(&self, node: u32, bit: u8) -> NodePointer {
        let node = &self.nodes[node as usize];
        if bit == 0 {
            node.left
        } else {
            node.right
        }
    }

    fn set_child(&mut self, node: u32, bit: u8, ptr: NodePointer) {
        let node = &mut self.nodes[node as usize];
        if bit == 0 {
            node.left = ptr;
        } else {
            node.right = ptr;
        }
    }

    /// Allocate a new node and return its ID
    fn allocate_node(&mut self) -> u32 {
        let id = self.nodes.len() as u32;
        self.nodes.push(Node::new_empty());
        id
    }

    fn push_value(&mut self, value: DataValue) -> u32 {
        let id = self.values.len() as u32;
        self.values.push(value);
        id
    }

    /// Walk to the edge for `bits/prefix`, creating nodes, and set it
    fn mark_edge(&mut self, bits: u128, prefix: u8, ptr: NodePointer) {
        let width = self.width();
        let mut node = 0u32;
        for depth in 0..prefix {
            let bit = ((bits >> (width - 1 - depth)) & 1) as u8;
            if depth + 1 == prefix {
                self.set_child(node, bit, ptr);
                return;
            }
            node = match self.child(node, bit) {
                NodePointer::Node(next) => next,
                NodePointer::Reserved | NodePointer::Alias => return,
                NodePointer::Empty | NodePointer::Data(_) => {
                    let next = self.allocate_node();
                    self.set_child(node, bit, NodePointer::Node(next));
                    next
                }
            };
        }
    }

    /// Apply an insert to everything below one edge
    fn cover_edge(&mut self, node: u32, bit: u8, cover: &mut Cover<'_>) {
        match self.child(node, bit) {
            NodePointer::Empty => {
                let id = match cover.fresh {
                    Some(id) => id,
                    None => {
                        let id = self.push_value(cover.strategy.merge(None, cover.value));
                        cover.fresh = Some(id);
                        id
                    }
                };
                self.set_child(node, bit, NodePointer::Data(id));
            }
            NodePointer::Data(existing) => {
                let id = match cover.merged.get(&existing) {
                    Some(id) => *id,
                    None => {
                        let merged = cover
                            .strategy
                            .merge(Some(&self.values[existing as usize]), cover.value);
                        let id = self.push_value(merged);
                        cover.merged.insert(existing, id);
                        id
                    }
                };
                self.set_child(node, bit, NodePointer::Data(id));
            }
            NodePointer::Node(child) => {
                self.cover_edge(child, 0, cover);
                self.cover_edge(child, 1, cover);
            }
            NodePointer::Reserved | NodePointer::Alias => {}
        }
    }

    /// Replace subtrees whose leaves all hold the same value by a single
    /// leaf. Returns the value if `node` itself became uniform.
    fn collapse(&mut self, node: u32) -> Option<u32> {
        let left = self.collapse_edge(node, 0);
        let right = self.collapse_edge(node, 1);

        if Some(node) == self.ipv4_root {
            return None;
        }
        match (left, right) {
            (Some(a), Some(b)) if a == b || self.values[a as usize] == self.values[b as usize] => {
                Some(a)
            }
            _ => None,
        }
    }

    fn collapse_edge(&mut self, node: u32, bit: u8) -> Option<u32> {
        match self.child(node, bit) {
            NodePointer::Data(vid) => Some(vid),
            NodePointer::Node(child) => {
                let uniform = self.collapse(child)?;
                self.set_child(node, bit, NodePointer::Data(uniform));
                Some(uniform)
            }
            _ => None,
        }
    }
}

fn write_node(out: &mut [u8], record_size: RecordSize, left: u32, right: u32) {
    match record_size {
        RecordSize::Bits24 => {
            out[0..3].copy_from_slice(&left.to_be_bytes()[1..]);
            out[3..6].copy_from_slice(&right.to_be_bytes()[1..]);
        }
        RecordSize::Bits28 => {
            // Layout: [Left 24 bits][Middle 8 bits][Right 24 bits]
            // Middle byte: left high 4 bits in upper nibble, right high 4 bits in lower nibble
            out[0..3].copy_from_slice(&left.to_be_bytes()[1..]);
            out[3] = ((((left >> 24) & 0x0F) as u8) << 4) | ((right >> 24) & 0x0F) as u8;
            out[4..7].copy_from_slice(&right.to_be_bytes()[1..]);
        }
        RecordSize::Bits32 => {
            out[0..4].copy_from_slice(&left.to_be_bytes());
            out[4..8].copy_from_slice(&right.to_be_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn net(s: &str) -> IpNetwork {
        s.parse().unwrap()
    }

    fn text(s: &str) -> DataValue {
        DataValue::String(s.to_string())
    }

    #[test]
    fn test_build_empty_tree() {
        let builder = TreeBuilder::new(IpVersion::V4, RecordSize::Bits24);
        let built = builder.build().unwrap();
        assert_eq!(built.node_count, 1);
        assert_eq!(built.tree.len(), 6);
        assert!(built.data.is_empty());
    }

    #[test]
    fn test_insert_ipv4_cidr() {
        let mut builder = TreeBuilder::new(IpVersion::V4, RecordSize::Bits24);
        builder
            .insert(net("192.168.0.0/16"), &text("x"), MergeStrategy::Replace)
            .unwrap();
        // Root plus one node per bit above the leaf edge
        assert_eq!(builder.node_count(), 16);

        let built = builder.build().unwrap();
        assert_eq!(built.node_count, 16);
        assert_eq!(built.tree.len(), 16 * 6);
    }

    #[test]
    fn test_ipv6_in_ipv4_tree_fails() {
        let mut builder = TreeBuilder::new(IpVersion::V4, RecordSize::Bits24);
        let err = builder
            .insert(net("::1/128"), &text("x"), MergeStrategy::Replace)
            .unwrap_err();
        assert!(matches!(err, MmdbioError::InvalidNetwork(_)));
    }

    #[test]
    fn test_reserved_rejects_inner_insert() {
        let mut builder = TreeBuilder::new(IpVersion::V4, RecordSize::Bits32);
        builder.reserve(net("10.0.0.0/8")).unwrap();

        let inner = builder.insert(net("10.1.0.0/16"), &text("x"), MergeStrategy::Replace);
        assert!(matches!(inner, Err(MmdbioError::ReservedNetwork(_))));
        let exact = builder.insert(net("10.0.0.0/8"), &text("x"), MergeStrategy::Replace);
        assert!(matches!(exact, Err(MmdbioError::ReservedNetwork(_))));

        // Covering insert goes around the reserved block
        builder
            .insert(net("0.0.0.0/4"), &text("x"), MergeStrategy::Replace)
            .unwrap();
    }

    #[test]
    fn test_alias_rejects_insert() {
        let mut builder = TreeBuilder::new(IpVersion::V6, RecordSize::Bits32);
        builder.enable_ipv4_aliasing().unwrap();
        let err = builder
            .insert(net("2002:0102:0304::/48"), &text("x"), MergeStrategy::Replace)
            .unwrap_err();
        assert!(matches!(err, MmdbioError::AliasedNetwork(_)));

        let mut v4 = TreeBuilder::new(IpVersion::V4, RecordSize::Bits32);
        assert!(v4.enable_ipv4_aliasing().is_err());
    }

    #[test]
    fn test_identical_siblings_collapse() {
        let mut builder = TreeBuilder::new(IpVersion::V4, RecordSize::Bits32);
        builder
            .insert(net("10.0.0.0/25"), &text("same"), MergeStrategy::Replace)
            .unwrap();
        builder
            .insert(net("10.0.0.128/25"), &text("same"), MergeStrategy::Replace)
            .unwrap();
        let separate = builder.node_count();
        let built = builder.build().unwrap();
        assert!((built.node_count as usize) < separate);
        assert_eq!(built.node_count, 24);
    }

    #[test]
    fn test_merge_applies_to_covered_values() {
        let mut first = HashMap::new();
        first.insert("a".to_string(), text("1"));
        let mut second = HashMap::new();
        second.insert("b".to_string(), text("2"));

        let mut builder = TreeBuilder::new(IpVersion::V4, RecordSize::Bits32);
        builder
            .insert(net("10.0.0.0/24"), &DataValue::Map(first), MergeStrategy::Replace)
            .unwrap();
        builder
            .insert(net("10.0.0.0/16"), &DataValue::Map(second), MergeStrategy::TopLevel)
            .unwrap();

        // One value for the /24 (merged) and one for the rest of the /16
        let merged_present = builder.values.iter().any(|v| {
            v.as_map()
                .map(|m| m.contains_key("a") && m.contains_key("b"))
                .unwrap_or(false)
        });
        assert!(merged_present);
    }

    #[test]
    fn test_record_size_overflow_detected() {
        let mut builder = TreeBuilder::new(IpVersion::V4, RecordSize::Bits24);
        // A single value whose encoding pushes offsets past 2^24
        builder
            .insert(net("1.0.0.0/8"), &text(&"x".repeat(1 << 24)), MergeStrategy::Replace)
            .unwrap();
        builder
            .insert(net("2.0.0.0/8"), &text("after"), MergeStrategy::Replace)
            .unwrap();
        let err = builder.build().unwrap_err();
        assert!(err.to_string().contains("record"));
    }

    #[test]
    fn test_write_28bit_node_layout() {
        let mut out = [0u8; 7];
        write_node(&mut out, RecordSize::Bits28, 0x1000001, 0x2000002);
        assert_eq!(out, [0x00, 0x00, 0x01, 0x12, 0x00, 0x00, 0x02]);
    }
}
