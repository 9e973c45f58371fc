//! Test fixture builder: fabricates small MaxMind DB images in
//! memory so the integration suites can exercise real lookups
//! without shipping binary fixtures.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::IpAddr;

/// Owned value written into a fixture's data section.
#[derive(Debug, Clone, PartialEq)]
pub enum Val {
    Str(String),
    Bytes(Vec<u8>),
    Double(f64),
    Float(f32),
    U16(u16),
    U32(u32),
    I32(i32),
    U64(u64),
    U128(u128),
    Bool(bool),
    Array(Vec<Val>),
    Map(Vec<(String, Val)>),
}

impl Val {
    pub fn str(s: &str) -> Val {
        Val::Str(s.to_string())
    }

    pub fn map(entries: &[(&str, Val)]) -> Val {
        Val::Map(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }
}

/// Encode one value the way the data section stores it.
pub fn encode_val(val: &Val) -> Vec<u8> {
    let mut out = Vec::new();
    write_val(val, &mut out);
    out
}

/// Control byte writer: type code, size, extension bytes.
fn write_control(code: u8, size: usize, out: &mut Vec<u8>) {
    let (size_bits, extra): (u8, Vec<u8>) = if size < 29 {
        (size as u8, Vec::new())
    } else if size < 285 {
        (29, vec![(size - 29) as u8])
    } else if size < 65821 {
        (30, ((size - 285) as u16).to_be_bytes().to_vec())
    } else {
        let v = (size - 65821) as u32;
        (31, vec![(v >> 16) as u8, (v >> 8) as u8, v as u8])
    };
    if code < 8 {
        out.push(code << 5 | size_bits);
    } else {
        out.push(size_bits);
        out.push(code - 7);
    }
    out.extend_from_slice(&extra);
}

/// Big-endian bytes with leading zeros stripped, as MMDB writers emit.
fn trimmed_be(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

fn write_val(val: &Val, out: &mut Vec<u8>) {
    match val {
        Val::Str(s) => {
            write_control(2, s.len(), out);
            out.extend_from_slice(s.as_bytes());
        }
        Val::Bytes(b) => {
            write_control(4, b.len(), out);
            out.extend_from_slice(b);
        }
        Val::Double(d) => {
            write_control(3, 8, out);
            out.extend_from_slice(&d.to_be_bytes());
        }
        Val::Float(f) => {
            write_control(15, 4, out);
            out.extend_from_slice(&f.to_be_bytes());
        }
        Val::U16(n) => {
            let be = n.to_be_bytes();
            let payload = trimmed_be(&be);
            write_control(5, payload.len(), out);
            out.extend_from_slice(payload);
        }
        Val::U32(n) => {
            let be = n.to_be_bytes();
            let payload = trimmed_be(&be);
            write_control(6, payload.len(), out);
            out.extend_from_slice(payload);
        }
        Val::I32(n) => {
            write_control(8, 4, out);
            out.extend_from_slice(&n.to_be_bytes());
        }
        Val::U64(n) => {
            let be = n.to_be_bytes();
            let payload = trimmed_be(&be);
            write_control(9, payload.len(), out);
            out.extend_from_slice(payload);
        }
        Val::U128(n) => {
            let be = n.to_be_bytes();
            let payload = trimmed_be(&be);
            write_control(10, payload.len(), out);
            out.extend_from_slice(payload);
        }
        Val::Bool(b) => {
            write_control(14, *b as usize, out);
        }
        Val::Array(items) => {
            write_control(11, items.len(), out);
            for item in items {
                write_val(item, out);
            }
        }
        Val::Map(entries) => {
            write_control(7, entries.len(), out);
            for (key, value) in entries {
                write_val(&Val::Str(key.clone()), out);
                write_val(value, out);
            }
        }
    }
}

/// Data section writer with value deduplication: identical values get
/// identical offsets, so adjacent networks can share a record.
#[derive(Default)]
struct DataWriter {
    buffer: Vec<u8>,
    dedup: HashMap<Vec<u8>, u32>,
}

impl DataWriter {
    fn write(&mut self, val: &Val) -> u32 {
        let mut encoded = Vec::new();
        write_val(val, &mut encoded);
        if let Some(&offset) = self.dedup.get(&encoded) {
            return offset;
        }
        let offset = self.buffer.len() as u32;
        self.buffer.extend_from_slice(&encoded);
        self.dedup.insert(encoded, offset);
        offset
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodePtr {
    Empty,
    Node(u32),
    Data(u32, u8),
}

#[derive(Debug, Clone)]
struct Node {
    left: NodePtr,
    right: NodePtr,
}

impl Node {
    fn new_empty() -> Node {
        Node {
            left: NodePtr::Empty,
            right: NodePtr::Empty,
        }
    }

    fn child(&self, bit: u8) -> NodePtr {
        if bit == 0 {
            self.left
        } else {
            self.right
        }
    }

    fn set_child(&mut self, bit: u8, ptr: NodePtr) {
        if bit == 0 {
            self.left = ptr;
        } else {
            self.right = ptr;
        }
    }
}

/// Fixture database builder: search tree, deduplicated data section,
/// separator, marker, and metadata, assembled the way producers lay
/// the file out.
pub struct DbBuilder {
    ip_version: u8,
    record_size: u16,
    database_type: String,
    nodes: Vec<Node>,
    data: DataWriter,
    aliases: Vec<(u128, u8)>,
}

impl DbBuilder {
    pub fn new(ip_version: u8, record_size: u16) -> DbBuilder {
        assert!(ip_version == 4 || ip_version == 6);
        DbBuilder {
            ip_version,
            record_size,
            database_type: "Test-DB".to_string(),
            nodes: vec![Node::new_empty()],
            data: DataWriter::default(),
            aliases: Vec::new(),
        }
    }

    pub fn database_type(mut self, name: &str) -> DbBuilder {
        self.database_type = name.to_string();
        self
    }

    /// Insert a CIDR entry with its record value.
    pub fn insert(&mut self, cidr: &str, val: &Val) {
        let (bits, prefix_len) = self.parse_cidr(cidr);
        let offset = self.data.write(val);
        self.insert_bits(bits, prefix_len, offset);
    }

    /// Alias an IPv6 prefix to the IPv4 subtree root, the way
    /// producers alias the mapped and 6to4 ranges.
    pub fn alias_to_v4(&mut self, cidr: &str) {
        let (bits, prefix_len) = self.parse_cidr(cidr);
        assert!(self.ip_version == 6 && prefix_len > 0);
        self.aliases.push((bits, prefix_len));
    }

    fn parse_cidr(&self, cidr: &str) -> (u128, u8) {
        let (addr, prefix) = match cidr.split_once('/') {
            Some((a, p)) => (a, Some(p.parse::<u8>().unwrap())),
            None => (cidr, None),
        };
        let ip: IpAddr = addr.parse().unwrap();
        match ip {
            IpAddr::V4(v4) => {
                let prefix_len = prefix.unwrap_or(32);
                let bits = u32::from_be_bytes(v4.octets()) as u128;
                if self.ip_version == 6 {
                    // IPv4 space lives under the 96-zero-bit prefix
                    (bits, prefix_len + 96)
                } else {
                    (bits << 96, prefix_len)
                }
            }
            IpAddr::V6(v6) => {
                assert!(self.ip_version == 6, "IPv6 entry in an IPv4 fixture");
                (u128::from_be_bytes(v6.octets()), prefix.unwrap_or(128))
            }
        }
    }

    fn allocate(&mut self) -> u32 {
        let id = self.nodes.len() as u32;
        self.nodes.push(Node::new_empty());
        id
    }

    fn insert_bits(&mut self, bits: u128, prefix_len: u8, offset: u32) {
        let mut node_id = 0u32;
        for depth in 0..prefix_len {
            let bit = ((bits >> (127 - depth)) & 1) as u8;
            let child = self.nodes[node_id as usize].child(bit);

            if depth + 1 == prefix_len {
                match child {
                    NodePtr::Empty => {
                        self.nodes[node_id as usize]
                            .set_child(bit, NodePtr::Data(offset, prefix_len));
                    }
                    NodePtr::Data(_, existing) => {
                        if prefix_len >= existing {
                            self.nodes[node_id as usize]
                                .set_child(bit, NodePtr::Data(offset, prefix_len));
                        }
                    }
                    NodePtr::Node(child_id) => {
                        // Less specific entry after more specific ones:
                        // fill the gaps below without clobbering them.
                        self.backfill(child_id, offset, prefix_len);
                    }
                }
                return;
            }

            match child {
                NodePtr::Empty => {
                    let new_id = self.allocate();
                    self.nodes[node_id as usize].set_child(bit, NodePtr::Node(new_id));
                    node_id = new_id;
                }
                NodePtr::Node(child_id) => {
                    node_id = child_id;
                }
                NodePtr::Data(existing_offset, existing_prefix) => {
                    // More specific entry under a less specific one:
                    // split the leaf, keeping the old record on both
                    // sides, and keep descending.
                    let new_id = self.allocate();
                    self.nodes[new_id as usize].left =
                        NodePtr::Data(existing_offset, existing_prefix);
                    self.nodes[new_id as usize].right =
                        NodePtr::Data(existing_offset, existing_prefix);
                    self.nodes[node_id as usize].set_child(bit, NodePtr::Node(new_id));
                    node_id = new_id;
                }
            }
        }
    }

    fn backfill(&mut self, node_id: u32, offset: u32, prefix_len: u8) {
        for bit in 0..2u8 {
            match self.nodes[node_id as usize].child(bit) {
                NodePtr::Empty => {
                    self.nodes[node_id as usize].set_child(bit, NodePtr::Data(offset, prefix_len));
                }
                NodePtr::Data(_, existing) => {
                    if prefix_len > existing {
                        self.nodes[node_id as usize]
                            .set_child(bit, NodePtr::Data(offset, prefix_len));
                    }
                }
                NodePtr::Node(child_id) => {
                    self.backfill(child_id, offset, prefix_len);
                }
            }
        }
    }

    /// Wire an alias path so it lands on the node the 96-zero-bit
    /// descent reaches.
    fn apply_alias(&mut self, bits: u128, prefix_len: u8) {
        let mut v4_root = 0u32;
        for _ in 0..96 {
            match self.nodes[v4_root as usize].left {
                NodePtr::Node(id) => v4_root = id,
                _ => panic!("IPv4 subtree absent; insert an IPv4 entry first"),
            }
        }
        let mut node_id = 0u32;
        for depth in 0..prefix_len - 1 {
            let bit = ((bits >> (127 - depth)) & 1) as u8;
            match self.nodes[node_id as usize].child(bit) {
                NodePtr::Node(id) => node_id = id,
                NodePtr::Empty => {
                    let new_id = self.allocate();
                    self.nodes[node_id as usize].set_child(bit, NodePtr::Node(new_id));
                    node_id = new_id;
                }
                NodePtr::Data(..) => panic!("alias path crosses a record"),
            }
        }
        let last_bit = ((bits >> (127 - (prefix_len - 1))) & 1) as u8;
        self.nodes[node_id as usize].set_child(last_bit, NodePtr::Node(v4_root));
    }

    fn ptr_value(&self, ptr: NodePtr, node_count: u32) -> u32 {
        match ptr {
            NodePtr::Empty => node_count,
            NodePtr::Node(id) => id,
            NodePtr::Data(offset, _) => node_count + 16 + offset,
        }
    }

    /// Assemble the file image.
    pub fn build(mut self) -> Vec<u8> {
        let aliases = std::mem::take(&mut self.aliases);
        for (bits, prefix_len) in aliases {
            self.apply_alias(bits, prefix_len);
        }

        let node_count = self.nodes.len() as u32;
        let node_bytes = match self.record_size {
            24 => 6,
            28 => 7,
            32 => 8,
            other => panic!("unsupported record size {}", other),
        };

        let mut out = Vec::with_capacity(node_count as usize * node_bytes + 256);
        for node in &self.nodes {
            let left = self.ptr_value(node.left, node_count);
            let right = self.ptr_value(node.right, node_count);
            match self.record_size {
                24 => {
                    out.extend_from_slice(&left.to_be_bytes()[1..]);
                    out.extend_from_slice(&right.to_be_bytes()[1..]);
                }
                28 => {
                    out.extend_from_slice(&left.to_be_bytes()[1..]);
                    out.push((((left >> 24) & 0x0F) as u8) << 4 | ((right >> 24) & 0x0F) as u8);
                    out.extend_from_slice(&right.to_be_bytes()[1..]);
                }
                _ => {
                    out.extend_from_slice(&left.to_be_bytes());
                    out.extend_from_slice(&right.to_be_bytes());
                }
            }
        }

        // Separator, data section, marker, metadata
        out.extend_from_slice(&[0u8; 16]);
        out.extend_from_slice(&self.data.buffer);
        out.extend_from_slice(b"\xAB\xCD\xEFMaxMind.com");

        let metadata = Val::Map(vec![
            ("binary_format_major_version".to_string(), Val::U16(2)),
            ("binary_format_minor_version".to_string(), Val::U16(0)),
            ("build_epoch".to_string(), Val::U64(1_700_000_000)),
            (
                "database_type".to_string(),
                Val::Str(self.database_type.clone()),
            ),
            (
                "description".to_string(),
                Val::map(&[("en", Val::str("Fixture database"))]),
            ),
            ("ip_version".to_string(), Val::U16(self.ip_version as u16)),
            (
                "languages".to_string(),
                Val::Array(vec![Val::str("en")]),
            ),
            ("node_count".to_string(), Val::U32(node_count)),
            ("record_size".to_string(), Val::U16(self.record_size)),
        ]);
        write_val(&metadata, &mut out);
        out
    }
}
