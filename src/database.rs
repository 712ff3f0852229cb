//! Database reader
//!
//! Opens an MMDB file (memory-mapped, or from an owned buffer) and answers
//! the questions the rest of the crate asks of it: the record for an
//! address, every stored network with its record, and the metadata.
//!
//! # Examples
//!
//! ```no_run
//! use mmdbio::Database;
//!
//! let db = Database::open("threats.mmdb")?;
//! if let Some(record) = db.lookup("1.2.3.4".parse()?)? {
//!     println!("{:?}", record);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs::File;
use std::net::IpAddr;
use std::path::Path;

use ipnetwork::IpNetwork;
use memmap2::Mmap;

use crate::data_section::{DataDecoder, DataValue};
use crate::mmdb::{Metadata, MmdbError, MmdbHeader, NetworkIter, SearchTree};

/// Storage for database data - either owned or memory-mapped
enum DatabaseStorage {
    Owned(Vec<u8>),
    Mmap(Mmap),
}

impl DatabaseStorage {
    fn as_slice(&self) -> &[u8] {
        match self {
            DatabaseStorage::Owned(v) => v.as_slice(),
            DatabaseStorage::Mmap(m) => &m[..],
        }
    }
}

/// An open MMDB database
///
/// The mapping is released when the value is dropped.
pub struct Database {
    data: DatabaseStorage,
    header: MmdbHeader,
    metadata: Metadata,
}

/// One stored network and its decoded record
#[derive(Debug, Clone)]
pub struct NetworkRecord {
    /// The network, IPv4 form for networks under `::/96`
    pub network: IpNetwork,
    /// The decoded record, or why it could not be decoded
    pub data: Result<DataValue, MmdbError>,
}

/// Number of networks per address family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkCounts {
    /// IPv4 networks
    pub ipv4: usize,
    /// IPv6 networks
    pub ipv6: usize,
}

impl NetworkCounts {
    /// Both families together
    pub fn total(&self) -> usize {
        self.ipv4 + self.ipv6
    }
}

impl Database {
    /// Open a database file using memory mapping
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MmdbError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            MmdbError::IoError(format!("Failed to open {}: {}", path.display(), e))
        })?;

        // SAFETY: the mapping is read-only and lives as long as `Database`
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
            MmdbError::IoError(format!("Failed to mmap {}: {}", path.display(), e))
        })?;

        Self::from_storage(DatabaseStorage::Mmap(mmap))
    }

    /// Create a database from raw bytes
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, MmdbError> {
        Self::from_storage(DatabaseStorage::Owned(data))
    }

    fn from_storage(storage: DatabaseStorage) -> Result<Self, MmdbError> {
        let data = storage.as_slice();
        let metadata = Metadata::from_file(data)?;
        let header = MmdbHeader::from_metadata(data, &metadata)?;
        Ok(Self {
            data: storage,
            header,
            metadata,
        })
    }

    /// Decoded metadata
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Section boundaries
    pub fn header(&self) -> &MmdbHeader {
        &self.header
    }

    /// The whole file
    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_slice()
    }

    /// The data section, which record offsets and pointers are relative to
    pub fn data_section(&self) -> &[u8] {
        &self.data.as_slice()[self.header.data_section_start..self.header.data_section_end]
    }

    /// Search tree over this file
    pub fn tree(&self) -> SearchTree<'_> {
        SearchTree::new(self.data.as_slice(), &self.header)
    }

    /// Decode the record at a data section offset
    pub fn decode(&self, offset: u32) -> Result<DataValue, MmdbError> {
        DataDecoder::new(self.data_section()).decode(offset)
    }

    /// Record for an address; `None` when no network contains it
    pub fn lookup(&self, ip: IpAddr) -> Result<Option<DataValue>, MmdbError> {
        Ok(self.lookup_prefix(ip)?.map(|(value, _)| value))
    }

    /// Record for an address together with the prefix length of the
    /// network that matched
    pub fn lookup_prefix(&self, ip: IpAddr) -> Result<Option<(DataValue, u8)>, MmdbError> {
        match self.tree().lookup(ip)? {
            Some(found) => {
                let value = self.decode(found.data_offset)?;
                Ok(Some((value, found.prefix_len)))
            }
            None => Ok(None),
        }
    }

    /// Every stored network with its decoded record, in address order
    ///
    /// Tree corruption is reported as `Err` items; a record that fails to
    /// decode is reported inside the `NetworkRecord`.
    pub fn networks(&self) -> Networks<'_> {
        Networks {
            db: self,
            inner: self.tree().networks(),
        }
    }

    /// Count the stored networks per family without decoding records
    pub fn network_counts(&self) -> Result<NetworkCounts, MmdbError> {
        let mut counts = NetworkCounts::default();
        for item in self.tree().networks() {
            match item?.0 {
                IpNetwork::V4(_) => counts.ipv4 += 1,
                IpNetwork::V6(_) => counts.ipv6 += 1,
            }
        }
        Ok(counts)
    }
}

/// Iterator returned by [`Database::networks`]
pub struct Networks<'a> {
    db: &'a Database,
    inner: NetworkIter<'a>,
}

impl Iterator for Networks<'_> {
    type Item = Result<NetworkRecord, MmdbError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next()?;
        Some(item.map(|(network, offset)| NetworkRecord {
            network,
            data: self.db.decode(offset),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmdb::{IpVersion, RecordSize};
    use crate::writer::{DatabaseWriter, WriterOptions};
    use std::collections::HashMap;

    fn record(name: &str) -> DataValue {
        let mut map = HashMap::new();
        map.insert("name".to_string(), DataValue::String(name.to_string()));
        DataValue::Map(map)
    }

    fn sample(options: WriterOptions) -> Database {
        let mut writer = DatabaseWriter::new(options.with_build_epoch(1)).unwrap();
        writer
            .insert_network("1.2.3.0/24".parse().unwrap(), &record("a"))
            .unwrap();
        writer
            .insert_network("8.8.8.8/32".parse().unwrap(), &record("b"))
            .unwrap();
        if writer.options().ip_version == IpVersion::V6 {
            writer
                .insert_network("2001:db8::/32".parse().unwrap(), &record("c"))
                .unwrap();
        }
        Database::from_bytes(writer.build().unwrap()).unwrap()
    }

    #[test]
    fn test_lookup_with_prefix() {
        let db = sample(WriterOptions::default());
        let (value, prefix) = db.lookup_prefix("1.2.3.4".parse().unwrap()).unwrap().unwrap();
        assert_eq!(value, record("a"));
        assert_eq!(prefix, 24);

        let (_, prefix) = db.lookup_prefix("2001:db8::1".parse().unwrap()).unwrap().unwrap();
        assert_eq!(prefix, 32);

        assert!(db.lookup("9.9.9.9".parse().unwrap()).unwrap().is_none());
    }

    #[test]
    fn test_networks_in_order() {
        let db = sample(WriterOptions::default());
        let nets: Vec<String> = db
            .networks()
            .map(|r| r.unwrap().network.to_string())
            .collect();
        assert_eq!(nets, vec!["1.2.3.0/24", "8.8.8.8/32", "2001:db8::/32"]);

        let counts = db.network_counts().unwrap();
        assert_eq!(counts, NetworkCounts { ipv4: 2, ipv6: 1 });
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_ipv4_database() {
        let db = sample(
            WriterOptions::default()
                .with_ip_version(IpVersion::V4)
                .with_record_size(RecordSize::Bits28),
        );
        assert_eq!(db.metadata().ip_version, IpVersion::V4);
        assert_eq!(db.lookup("8.8.8.8".parse().unwrap()).unwrap(), Some(record("b")));
        assert!(matches!(
            db.lookup("::1".parse().unwrap()),
            Err(MmdbError::LookupError(_))
        ));
    }

    #[test]
    fn test_aliased_lookup() {
        let db = sample(WriterOptions::default().with_ipv4_aliasing(true));
        let mapped: IpAddr = "::ffff:1.2.3.4".parse().unwrap();
        assert_eq!(db.lookup(mapped).unwrap(), Some(record("a")));
        let six_to_four: IpAddr = "2002:0808:0808::".parse().unwrap();
        assert_eq!(db.lookup(six_to_four).unwrap(), Some(record("b")));

        // Alias edges are not enumerated
        assert_eq!(db.networks().count(), 3);
    }

    #[test]
    fn test_not_a_database() {
        assert!(matches!(
            Database::from_bytes(vec![0u8; 64]),
            Err(MmdbError::MetadataNotFound)
        ));
    }

    #[test]
    fn test_open_missing_file() {
        let err = Database::open("/nonexistent/db.mmdb").err().unwrap();
        assert!(matches!(err, MmdbError::IoError(_)));
    }
}
