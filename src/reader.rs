//! Reader façade: open a database, look up addresses, iterate
//! networks.
//!
//! A [`Reader`] is immutable after construction and safe to share
//! across threads for lookups; every lookup materializes into a
//! freshly returned record and touches no reader state. Records
//! borrow from the mapped view, so they cannot outlive the reader:
//! dropping the reader releases the buffer or the mapping.

use crate::decoder::Decoder;
use crate::error::{Error, Result};
use crate::ip::{Address, Network};
use crate::metadata::{IpVersion, Metadata};
use crate::mmap::{read_bounded, MmapFile};
use crate::record::{LookupOptions, Record};
use crate::tree::{Found, SearchTree};
use crate::within::Within;
use std::fmt;
use std::net::IpAddr;
use std::path::Path;

/// Marker separating the data section from metadata.
pub(crate) const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

/// All-zero separator between the tree and the data section.
const DATA_SECTION_SEPARATOR: usize = 16;

/// Storage for database bytes - either owned or memory-mapped
enum Storage {
    Owned(Vec<u8>),
    Mapped(MmapFile),
}

impl Storage {
    fn as_slice(&self) -> &[u8] {
        match self {
            Storage::Owned(buf) => buf.as_slice(),
            Storage::Mapped(map) => map.as_slice(),
        }
    }
}

/// One lookup hit: the covering network and the materialized record.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupResult<T> {
    /// Network of the tree entry that covered the queried address
    pub network: Network,
    /// The materialized record
    pub record: T,
}

/// An open database.
///
/// # Examples
///
/// ```no_run
/// use mmdb_reader::{LookupOptions, Reader, Value};
///
/// let reader = Reader::mmap("GeoLite2-Country.mmdb")?;
/// let ip: std::net::IpAddr = "89.160.20.128".parse()?;
/// if let Some(hit) = reader.lookup::<Value>(ip, LookupOptions::default())? {
///     println!("{} -> {:?}", hit.network, hit.record);
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Reader {
    storage: Storage,
    metadata: Metadata,
    /// Start of the data section: tree bytes plus the separator
    data_start: usize,
    /// End of the data section: the metadata marker offset
    data_end: usize,
    ipv4_start: u32,
}

impl Reader {
    /// Read the file onto the heap, refusing files larger than
    /// `max_size` bytes.
    pub fn open<P: AsRef<Path>>(path: P, max_size: u64) -> Result<Self> {
        Self::with_storage(Storage::Owned(read_bounded(path, max_size)?))
    }

    /// Memory-map the file read-only.
    pub fn mmap<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_storage(Storage::Mapped(MmapFile::open(path)?))
    }

    /// Use an in-memory database image.
    pub fn from_bytes(buf: Vec<u8>) -> Result<Self> {
        if buf.is_empty() {
            return Err(Error::FileEmpty);
        }
        Self::with_storage(Storage::Owned(buf))
    }

    fn with_storage(storage: Storage) -> Result<Self> {
        let buf = storage.as_slice();
        let marker = find_metadata_start(buf)?;
        let metadata = Metadata::decode(&buf[marker + METADATA_MARKER.len()..])?;

        let tree_size = metadata.node_count as usize * metadata.record_size.node_bytes();
        let data_start = tree_size + DATA_SECTION_SEPARATOR;
        if data_start > buf.len() || data_start > marker {
            return Err(Error::CorruptedTree);
        }

        let ipv4_start = if metadata.ip_version == IpVersion::V6 {
            SearchTree::new(buf, metadata.node_count, metadata.record_size).ipv4_start()?
        } else {
            0
        };

        Ok(Reader {
            storage,
            metadata,
            data_start,
            data_end: marker,
            ipv4_start,
        })
    }

    /// Parsed metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub(crate) fn tree(&self) -> SearchTree<'_> {
        SearchTree::new(
            self.storage.as_slice(),
            self.metadata.node_count,
            self.metadata.record_size,
        )
    }

    pub(crate) fn data_section(&self) -> &[u8] {
        &self.storage.as_slice()[self.data_start..self.data_end]
    }

    pub(crate) fn ipv4_start(&self) -> u32 {
        self.ipv4_start
    }

    /// Start node for a traversal of `addr`'s width.
    pub(crate) fn start_node(&self, addr: &Address) -> u32 {
        match (addr, self.metadata.ip_version) {
            (Address::V4(_), IpVersion::V6) => self.ipv4_start,
            _ => 0,
        }
    }

    /// Cross-family handling: an IPv6 address that embeds an IPv4 one
    /// collapses for IPv4-only trees; any other IPv6 address cannot
    /// be present in such a tree.
    fn query_address(&self, addr: Address) -> Option<Address> {
        if self.metadata.ip_version == IpVersion::V4 {
            if let Address::V6(_) = addr {
                return addr.embedded_v4();
            }
        }
        Some(addr)
    }

    /// Look up `ip`, materializing the covering record as `T`.
    ///
    /// Returns `Ok(None)` when no record covers the address. The
    /// record borrows string and byte payloads from the mapped view.
    pub fn lookup<'a, T: Record<'a>>(
        &'a self,
        ip: IpAddr,
        options: LookupOptions<'_>,
    ) -> Result<Option<LookupResult<T>>> {
        let addr = match self.query_address(Address::from_ip(ip)) {
            Some(addr) => addr,
            None => return Ok(None),
        };
        let tree = self.tree();
        match tree.find(&addr, self.start_node(&addr))? {
            Found::Empty => Ok(None),
            Found::Record {
                pointer,
                prefix_len,
            } => {
                let record = self.materialize(pointer, options.only)?;
                Ok(Some(LookupResult {
                    network: addr.network(prefix_len),
                    record,
                }))
            }
        }
    }

    /// Materialize the record named by a tree pointer value.
    pub(crate) fn materialize<'a, T: Record<'a>>(
        &'a self,
        pointer: u32,
        only: Option<&[&str]>,
    ) -> Result<T> {
        let offset = self.tree().data_offset(pointer)?;
        let data = self.data_section();
        if offset >= data.len() {
            return Err(Error::CorruptedTree);
        }
        let mut cursor = offset;
        T::read(&Decoder::new(data), &mut cursor, only)
    }

    /// Iterate every network inside `network` that has a record, in
    /// depth-first, left-before-right order.
    pub fn within<'a, T: Record<'a> + Clone>(
        &'a self,
        network: Network,
        options: LookupOptions<'a>,
    ) -> Result<Within<'a, T>> {
        Within::new(self, network, options)
    }
}

impl fmt::Debug for Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("database_type", &self.metadata.database_type)
            .field("node_count", &self.metadata.node_count)
            .field("size", &self.storage.as_slice().len())
            .finish()
    }
}

/// Offset of the last metadata marker occurrence. Earlier occurrences
/// inside the data section are ignored.
fn find_metadata_start(buf: &[u8]) -> Result<usize> {
    buf.windows(METADATA_MARKER.len())
        .rposition(|window| window == METADATA_MARKER)
        .ok_or(Error::MetadataStartNotFound)
}
