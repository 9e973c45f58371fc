//! Database metadata.
//!
//! The metadata section at the tail of the file is one map encoded
//! with the ordinary data format. Only `node_count`, `record_size`,
//! and `ip_version` drive lookups; the rest is carried for callers.

use crate::decoder::Decoder;
use crate::error::{Error, Result};
use crate::value::{Map, Value};

/// Record size in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSize {
    /// 24-bit records, 6 bytes per node
    Bits24,
    /// 28-bit records, 7 bytes per node
    Bits28,
    /// 32-bit records, 8 bytes per node
    Bits32,
}

impl RecordSize {
    /// Create from the bit size stored in metadata.
    pub fn from_bits(bits: u16) -> Result<Self> {
        match bits {
            24 => Ok(RecordSize::Bits24),
            28 => Ok(RecordSize::Bits28),
            32 => Ok(RecordSize::Bits32),
            other => Err(Error::UnknownRecordSize(other)),
        }
    }

    /// The bit size as stored in metadata.
    pub fn bits(self) -> u16 {
        match self {
            RecordSize::Bits24 => 24,
            RecordSize::Bits28 => 28,
            RecordSize::Bits32 => 32,
        }
    }

    /// Bytes per tree node (two records).
    pub fn node_bytes(self) -> usize {
        match self {
            RecordSize::Bits24 => 6,
            RecordSize::Bits28 => 7,
            RecordSize::Bits32 => 8,
        }
    }
}

/// IP version of the search tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    /// 32-bit tree, IPv4 only
    V4,
    /// 128-bit tree; IPv4 lives under the 96-zero-bit prefix
    V6,
}

/// Metadata decoded from the tail of the file.
///
/// Owned outright so it can outlive any particular borrow of the
/// mapped view.
#[derive(Debug, Clone)]
pub struct Metadata {
    /// Major version of the binary format
    pub binary_format_major_version: u16,
    /// Minor version of the binary format
    pub binary_format_minor_version: u16,
    /// Build timestamp, seconds since the epoch
    pub build_epoch: u64,
    /// Database product name, e.g. `GeoLite2-Country`
    pub database_type: String,
    /// Language-tagged descriptions, in wire order
    pub description: Vec<(String, String)>,
    /// IP version of the search tree
    pub ip_version: IpVersion,
    /// Locale codes the record names are available in
    pub languages: Vec<String>,
    /// Number of nodes in the search tree
    pub node_count: u32,
    /// Record size of the search tree
    pub record_size: RecordSize,
}

impl Metadata {
    /// Decode the metadata map starting at the head of `section`.
    pub(crate) fn decode(section: &[u8]) -> Result<Self> {
        let dec = Decoder::new(section);
        let mut cursor = 0;
        let value = dec.read_value(&mut cursor)?;
        Self::from_value(&value)
    }

    fn from_value(value: &Value) -> Result<Self> {
        let map = match value {
            Value::Map(map) => map,
            _ => return Err(Error::InvalidMetadata("metadata is not a map".to_string())),
        };

        let ip_version = match require_uint(map, "ip_version")? {
            4 => IpVersion::V4,
            6 => IpVersion::V6,
            other => {
                return Err(Error::InvalidMetadata(format!(
                    "unsupported ip_version {}",
                    other
                )))
            }
        };

        let description = match map.get("description") {
            Some(Value::Map(entries)) => {
                let mut out = Vec::with_capacity(entries.len());
                for (lang, text) in entries {
                    match text {
                        Value::String(s) => out.push((lang.to_string(), s.to_string())),
                        _ => {
                            return Err(Error::InvalidMetadata(
                                "description entry is not a string".to_string(),
                            ))
                        }
                    }
                }
                out
            }
            Some(_) => {
                return Err(Error::InvalidMetadata(
                    "description is not a map".to_string(),
                ))
            }
            None => Vec::new(),
        };

        let languages = match map.get("languages") {
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) => out.push(s.to_string()),
                        _ => {
                            return Err(Error::InvalidMetadata(
                                "language entry is not a string".to_string(),
                            ))
                        }
                    }
                }
                out
            }
            Some(_) => {
                return Err(Error::InvalidMetadata(
                    "languages is not an array".to_string(),
                ))
            }
            None => Vec::new(),
        };

        Ok(Metadata {
            binary_format_major_version: require_uint(map, "binary_format_major_version")? as u16,
            binary_format_minor_version: require_uint(map, "binary_format_minor_version")? as u16,
            build_epoch: require_uint(map, "build_epoch")?,
            database_type: require_str(map, "database_type")?.to_string(),
            description,
            ip_version,
            languages,
            node_count: require_uint(map, "node_count")? as u32,
            record_size: RecordSize::from_bits(require_uint(map, "record_size")? as u16)?,
        })
    }
}

fn require_uint(map: &Map<Value>, key: &str) -> Result<u64> {
    match map.get(key) {
        Some(Value::Uint16(n)) => Ok(*n as u64),
        Some(Value::Uint32(n)) => Ok(*n as u64),
        Some(Value::Uint64(n)) => Ok(*n),
        Some(_) => Err(Error::InvalidMetadata(format!(
            "field '{}' is not an unsigned integer",
            key
        ))),
        None => Err(Error::InvalidMetadata(format!(
            "required field '{}' not found",
            key
        ))),
    }
}

fn require_str<'a>(map: &Map<'a, Value<'a>>, key: &str) -> Result<&'a str> {
    match map.get(key) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(Error::InvalidMetadata(format!(
            "field '{}' is not a string",
            key
        ))),
        None => Err(Error::InvalidMetadata(format!(
            "required field '{}' not found",
            key
        ))),
    }
}
