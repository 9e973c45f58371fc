//! mmdb-reader - Zero-Copy Reader for the MaxMind DB Binary Format
//!
//! mmdb-reader memory-maps `.mmdb` files (GeoLite2, GeoIP2, and any
//! other database in the MaxMind DB v2 format) and resolves IP
//! addresses to structured records at hundreds of thousands of
//! lookups per second per core.
//!
//! # Quick Start
//!
//! ```no_run
//! use mmdb_reader::{record, LookupOptions, Map, Reader};
//!
//! record! {
//!     pub struct Country<'a> {
//!         pub iso_code: &'a str,
//!         pub geoname_id: u32,
//!         pub names: Map<'a, &'a str>,
//!     }
//! }
//!
//! record! {
//!     pub struct CountryRecord<'a> {
//!         pub country: Country<'a>,
//!     }
//! }
//!
//! let reader = Reader::mmap("GeoLite2-Country.mmdb")?;
//! let ip: std::net::IpAddr = "89.160.20.128".parse()?;
//!
//! if let Some(hit) = reader.lookup::<CountryRecord>(ip, LookupOptions::default())? {
//!     println!("{} -> {}", hit.network, hit.record.country.iso_code);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Key Features
//!
//! - **Zero-Copy Records**: strings and byte fields alias the mapped
//!   file; no payload is copied on the lookup path
//! - **Caller-Shaped Records**: declare only the fields you care
//!   about with [`record!`]; everything else is skipped, not decoded
//! - **Projection**: restrict decoding to named top-level fields via
//!   [`LookupOptions`]
//! - **Dynamic Fallback**: decode any record into [`Value`] without
//!   declaring a schema
//! - **Network Enumeration**: walk every recorded network inside a
//!   CIDR with `Reader::within`
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  MaxMind DB File Format                 │
//! ├─────────────────────────────────────────┤
//! │  1. Binary Search Tree (bit trie)       │
//! │  2. 16-byte separator                   │
//! │  3. Data Section (records, strings)     │
//! │  4. Marker + Metadata                   │
//! └─────────────────────────────────────────┘
//!          ↓ mmap() or bounded read
//! ┌─────────────────────────────────────────┐
//! │  Reader: walk tree bits → data pointer  │
//! │  → decode → caller-shaped record        │
//! └─────────────────────────────────────────┘
//! ```
//!
//! A `Reader` is immutable and shareable across threads for lookups.
//! Records borrow from the reader, so the borrow checker enforces
//! that no record outlives the underlying map.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Module declarations
/// Data-section decoding primitives
pub mod decoder;
/// Error types for reader operations
pub mod error;
/// Addresses and CIDR networks
pub mod ip;
/// Database metadata
pub mod metadata;
/// Reader façade
pub mod reader;
/// Record traits, projection, and the `record!` macro
pub mod record;
/// Dynamic values
pub mod value;
/// Network enumeration
pub mod within;

mod mmap;
mod tree;

// Re-exports for the public surface

/// Decoder handle passed to record implementations
pub use crate::decoder::{Decoder, FieldType};
pub use crate::error::{Error, Result};
pub use crate::ip::Network;
pub use crate::metadata::{IpVersion, Metadata, RecordSize};
pub use crate::reader::{LookupResult, Reader};
pub use crate::record::{FromData, LookupOptions, Record};
pub use crate::value::{Map, Value};
pub use crate::within::Within;

// Version information
/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
