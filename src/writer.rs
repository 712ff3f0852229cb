//! MMDB Database Writer
//!
//! Assembles a complete MaxMind DB file: search tree, 16-byte separator,
//! data section, metadata marker and metadata map.

use std::collections::BTreeMap;
use std::io::Write;
use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use ipnetwork::IpNetwork;
use log::debug;

use crate::data_section::DataValue;
use crate::error::{MmdbioError, Result};
use crate::merge::MergeStrategy;
use crate::mmdb::{IpVersion, Metadata, RecordSize, DATA_SECTION_SEPARATOR_SIZE};
use crate::network::{range_to_cidrs, reserved_ipv4, reserved_ipv6};
use crate::tree_builder::TreeBuilder;

/// Default `database_type` written to metadata
pub const DEFAULT_DATABASE_TYPE: &str = "Custom-ip-database";

/// Default English description written to metadata
pub const DEFAULT_DESCRIPTION: &str = "Custom IP Intelligence Database";

/// Encoder configuration
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Free-form database type (title)
    pub database_type: String,
    /// Language code -> description
    pub description: BTreeMap<String, String>,
    /// Locales listed in metadata
    pub languages: Vec<String>,
    /// Address family of the tree
    pub ip_version: IpVersion,
    /// Record width
    pub record_size: RecordSize,
    /// How overlapping inserts combine
    pub merge: MergeStrategy,
    /// Alias ::ffff:0:0/96 and 2002::/16 to the IPv4 subtree
    pub ipv4_aliasing: bool,
    /// Allow data in reserved networks (private, loopback, documentation...)
    pub include_reserved: bool,
    /// Fixed build time; the current time when `None`
    pub build_epoch: Option<u64>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        let mut description = BTreeMap::new();
        description.insert("en".to_string(), DEFAULT_DESCRIPTION.to_string());
        Self {
            database_type: DEFAULT_DATABASE_TYPE.to_string(),
            description,
            languages: vec!["en".to_string()],
            ip_version: IpVersion::V6,
            record_size: RecordSize::Bits32,
            merge: MergeStrategy::Replace,
            ipv4_aliasing: false,
            include_reserved: true,
            build_epoch: None,
        }
    }
}

impl WriterOptions {
    /// Set the database type name
    pub fn with_database_type(mut self, db_type: impl Into<String>) -> Self {
        self.database_type = db_type.into();
        self
    }

    /// Add a description in a specific language
    ///
    /// The language is also added to the `languages` list.
    pub fn with_description(mut self, language: impl Into<String>, text: impl Into<String>) -> Self {
        let language = language.into();
        if !self.languages.contains(&language) {
            self.languages.push(language.clone());
        }
        self.description.insert(language, text.into());
        self
    }

    /// Set the address family
    pub fn with_ip_version(mut self, ip_version: IpVersion) -> Self {
        self.ip_version = ip_version;
        self
    }

    /// Set the record width
    pub fn with_record_size(mut self, record_size: RecordSize) -> Self {
        self.record_size = record_size;
        self
    }

    /// Set the merge strategy
    pub fn with_merge(mut self, merge: MergeStrategy) -> Self {
        self.merge = merge;
        self
    }

    /// Enable or disable IPv4 aliasing
    pub fn with_ipv4_aliasing(mut self, enabled: bool) -> Self {
        self.ipv4_aliasing = enabled;
        self
    }

    /// Include or exclude reserved networks
    pub fn with_reserved_networks(mut self, include: bool) -> Self {
        self.include_reserved = include;
        self
    }

    /// Use a fixed build epoch (reproducible output)
    pub fn with_build_epoch(mut self, epoch: u64) -> Self {
        self.build_epoch = Some(epoch);
        self
    }
}

/// Parse the `--ip` option value
pub fn parse_ip_version(n: u64) -> Result<IpVersion> {
    IpVersion::from_number(n).map_err(|_| MmdbioError::Config("--ip must be 4 or 6".to_string()))
}

/// Parse the `--size` option value
pub fn parse_record_size(bits: u16) -> Result<RecordSize> {
    RecordSize::from_bits(bits)
        .map_err(|_| MmdbioError::Config("--size must be 24, 28, or 32".to_string()))
}

/// Builds an MMDB file from inserted networks
pub struct DatabaseWriter {
    options: WriterOptions,
    tree: TreeBuilder,
    inserted: usize,
}

impl DatabaseWriter {
    /// Create a writer, setting up aliases and reserved networks
    pub fn new(options: WriterOptions) -> Result<Self> {
        let mut tree = TreeBuilder::new(options.ip_version, options.record_size);

        if options.ipv4_aliasing {
            tree.enable_ipv4_aliasing()?;
        }

        if !options.include_reserved {
            let mut reserved = reserved_ipv4();
            if options.ip_version == IpVersion::V6 {
                reserved.extend(reserved_ipv6());
            }
            for network in reserved {
                tree.reserve(network)?;
            }
        }

        Ok(Self {
            options,
            tree,
            inserted: 0,
        })
    }

    /// Options the writer was created with
    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// Number of successful insert calls
    pub fn inserted(&self) -> usize {
        self.inserted
    }

    /// Insert a value for a CIDR block
    pub fn insert_network(&mut self, network: IpNetwork, value: &DataValue) -> Result<()> {
        self.tree.insert(network, value, self.options.merge)?;
        self.inserted += 1;
        debug!("inserted {}", network);
        Ok(())
    }

    /// Insert a value for every address in `start..=end`
    ///
    /// Blocks of the range that fall inside reserved or aliased networks are
    /// left out; the call fails only when no block could be inserted.
    pub fn insert_range(&mut self, start: IpAddr, end: IpAddr, value: &DataValue) -> Result<()> {
        let cidrs = range_to_cidrs(start, end)?;
        debug!("range {}-{} covers {} networks", start, end, cidrs.len());

        let mut last_rejection = None;
        let mut any_inserted = false;
        for network in cidrs {
            match self.tree.insert(network, value, self.options.merge) {
                Ok(()) => any_inserted = true,
                Err(e @ (MmdbioError::ReservedNetwork(_) | MmdbioError::AliasedNetwork(_))) => {
                    debug!("range {}-{}: {}", start, end, e);
                    last_rejection = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        match (any_inserted, last_rejection) {
            (false, Some(e)) => Err(e),
            _ => {
                self.inserted += 1;
                Ok(())
            }
        }
    }

    /// Serialize the complete database
    pub fn build(self) -> Result<Vec<u8>> {
        let built = self.tree.build()?;

        let build_epoch = self.options.build_epoch.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0)
        });

        let metadata = Metadata {
            node_count: built.node_count,
            record_size: self.options.record_size,
            ip_version: self.options.ip_version,
            database_type: self.options.database_type,
            languages: self.options.languages,
            description: self.options.description,
            binary_format_major_version: 2,
            binary_format_minor_version: 0,
            build_epoch,
        };
        let metadata_bytes = metadata.to_bytes();

        let mut database = Vec::with_capacity(
            built.tree.len() + DATA_SECTION_SEPARATOR_SIZE + built.data.len() + metadata_bytes.len(),
        );
        database.extend_from_slice(&built.tree);
        database.extend_from_slice(&[0u8; DATA_SECTION_SEPARATOR_SIZE]);
        database.extend_from_slice(&built.data);
        database.extend_from_slice(&metadata_bytes);

        debug!(
            "built database: {} nodes, {} data bytes",
            built.node_count,
            built.data.len()
        );
        Ok(database)
    }

    /// Serialize and write to `out`, returning the number of bytes written
    pub fn write_to<W: Write>(self, mut out: W) -> Result<usize> {
        let bytes = self.build()?;
        out.write_all(&bytes)?;
        out.flush()?;
        Ok(bytes.len())
    }
}
