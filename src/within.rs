//! Depth-first enumeration of the recorded networks inside a query
//! network.
//!
//! The iterator owns its traversal stack and a small cache of decoded
//! records; adjacent networks in real databases frequently share one
//! record pointer, so a cache hit clones the previous materialization
//! instead of re-decoding. Dropping the iterator releases the stack
//! and every cached record.

use crate::error::{Error, Result};
use crate::ip::{Address, Network};
use crate::metadata::IpVersion;
use crate::reader::{LookupResult, Reader};
use crate::record::{LookupOptions, Record};

/// Decoded-record cache capacity. Fixed at build time to keep the
/// lookup loop branch-free; sized for city-level databases where runs
/// of adjacent networks share a record.
const CACHE_SLOTS: usize = 16;

struct Frame {
    node: u32,
    ip: Address,
    prefix_len: u8,
}

/// Ring of the most recently materialized records, keyed by the raw
/// tree pointer value. Linear scan; sixteen comparisons are trivial
/// against the cost of decoding.
struct RecordCache<T> {
    slots: Vec<(u32, T)>,
    next: usize,
}

impl<T: Clone> RecordCache<T> {
    fn new() -> Self {
        RecordCache {
            slots: Vec::with_capacity(CACHE_SLOTS),
            next: 0,
        }
    }

    fn get(&self, pointer: u32) -> Option<&T> {
        self.slots
            .iter()
            .find(|(p, _)| *p == pointer)
            .map(|(_, record)| record)
    }

    fn insert(&mut self, pointer: u32, record: T) {
        if self.slots.len() < CACHE_SLOTS {
            self.slots.push((pointer, record));
        } else {
            self.slots[self.next] = (pointer, record);
            self.next = (self.next + 1) % CACHE_SLOTS;
        }
    }
}

/// Iterator over the recorded networks inside a query network.
///
/// Produced by `Reader::within`. Yield order is deterministic:
/// depth-first, left before right. The iterator holds mutable state
/// and is not meant to be shared across threads; the reader it
/// borrows from can be.
pub struct Within<'a, T> {
    reader: &'a Reader,
    only: Option<&'a [&'a str]>,
    stack: Vec<Frame>,
    cache: RecordCache<T>,
}

impl<'a, T: Record<'a> + Clone> Within<'a, T> {
    pub(crate) fn new(
        reader: &'a Reader,
        network: Network,
        options: LookupOptions<'a>,
    ) -> Result<Self> {
        let mut addr = Address::from_ip(network.ip);
        let mut prefix_len = network.prefix_len;
        if prefix_len > addr.bit_count() {
            return Err(Error::InvalidPrefixLen);
        }

        // An IPv6 query against an IPv4-only tree works only when it
        // names IPv4 space.
        if reader.metadata().ip_version == IpVersion::V4 {
            if let Address::V6(_) = addr {
                if prefix_len >= 96 {
                    match addr.embedded_v4() {
                        Some(v4) => {
                            addr = v4;
                            prefix_len -= 96;
                        }
                        None => return Err(Error::InvalidIpAddress(network.to_string())),
                    }
                } else if addr == Address::from_ip(Network::ALL_V6.ip) && prefix_len == 0 {
                    addr = Address::from_ip(Network::ALL_V4.ip);
                } else {
                    return Err(Error::InvalidIpAddress(network.to_string()));
                }
            }
        }

        let tree = reader.tree();
        let node_count = tree.node_count();
        let mut node = reader.start_node(&addr);
        let mut exhausted = false;
        for i in 0..prefix_len {
            if node >= node_count {
                // A record or empty slot above the query network;
                // nothing below it to enumerate.
                exhausted = true;
                break;
            }
            node = tree.read_record(node, addr.bit(i))?;
        }

        let mut stack = Vec::with_capacity((addr.bit_count() - prefix_len) as usize + 1);
        if !exhausted {
            stack.push(Frame {
                node,
                ip: addr,
                prefix_len,
            });
        }

        Ok(Within {
            reader,
            only: options.only,
            stack,
            cache: RecordCache::new(),
        })
    }

    fn record_for(&mut self, pointer: u32) -> Result<T> {
        if let Some(record) = self.cache.get(pointer) {
            return Ok(record.clone());
        }
        let record: T = self.reader.materialize(pointer, self.only)?;
        self.cache.insert(pointer, record.clone());
        Ok(record)
    }
}

impl<'a, T: Record<'a> + Clone> Iterator for Within<'a, T> {
    type Item = Result<LookupResult<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        let node_count = self.reader.metadata().node_count;
        while let Some(Frame {
            node,
            ip,
            prefix_len,
        }) = self.stack.pop()
        {
            // The IPv4 subtree is reachable both through its 96-zero-bit
            // prefix and through mapped-range aliases; yield it only for
            // the former.
            if node == self.reader.ipv4_start()
                && ip.bit_count() == 128
                && !ip.is_v4_in_v6()
            {
                continue;
            }

            if node > node_count {
                return Some(self.record_for(node).map(|record| LookupResult {
                    network: ip.network(prefix_len),
                    record,
                }));
            }

            if node < node_count {
                if prefix_len >= ip.bit_count() {
                    return Some(Err(Error::InvalidTreeNode));
                }
                let tree = self.reader.tree();
                let left = match tree.read_record(node, 0) {
                    Ok(value) => value,
                    Err(e) => return Some(Err(e)),
                };
                let right = match tree.read_record(node, 1) {
                    Ok(value) => value,
                    Err(e) => return Some(Err(e)),
                };
                let mut right_ip = ip;
                right_ip.set_bit(prefix_len);
                // Right first so the left subtree pops first.
                self.stack.push(Frame {
                    node: right,
                    ip: right_ip,
                    prefix_len: prefix_len + 1,
                });
                self.stack.push(Frame {
                    node: left,
                    ip,
                    prefix_len: prefix_len + 1,
                });
            }
            // node == node_count: empty slot, discard.
        }
        None
    }
}
