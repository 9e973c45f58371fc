//! IP address bit access, masking, and network formatting.
//!
//! The search tree is walked bit by bit from the most significant bit
//! of the address, so addresses are handled here as raw big-endian
//! bytes. [`Network`] is the public CIDR type returned by lookups and
//! accepted by `Reader::within`.

use crate::error::{Error, Result};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// An IP address as raw big-endian bytes, 4 or 16 wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Address {
    V4([u8; 4]),
    V6([u8; 16]),
}

impl Address {
    pub fn from_ip(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(addr) => Address::V4(addr.octets()),
            IpAddr::V6(addr) => Address::V6(addr.octets()),
        }
    }

    pub fn to_ip(self) -> IpAddr {
        match self {
            Address::V4(bytes) => IpAddr::V4(Ipv4Addr::from(bytes)),
            Address::V6(bytes) => IpAddr::V6(Ipv6Addr::from(bytes)),
        }
    }

    /// Width of the address in bits: 32 or 128.
    pub fn bit_count(&self) -> u8 {
        match self {
            Address::V4(_) => 32,
            Address::V6(_) => 128,
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            Address::V4(bytes) => bytes,
            Address::V6(bytes) => bytes,
        }
    }

    /// The i-th bit counted from the MSB of the first byte.
    pub fn bit(&self, i: u8) -> u8 {
        let bytes = self.bytes();
        (bytes[(i / 8) as usize] >> (7 - i % 8)) & 1
    }

    /// Set the i-th bit counted from the MSB of the first byte.
    pub fn set_bit(&mut self, i: u8) {
        let bytes = match self {
            Address::V4(bytes) => &mut bytes[..],
            Address::V6(bytes) => &mut bytes[..],
        };
        bytes[(i / 8) as usize] |= 1 << (7 - i % 8);
    }

    /// Whether this is an IPv6 form embedding an IPv4 address: the
    /// first twelve bytes are all zero.
    pub fn is_v4_in_v6(&self) -> bool {
        match self {
            Address::V4(_) => false,
            Address::V6(bytes) => bytes[..12].iter().all(|&b| b == 0),
        }
    }

    /// The IPv4 address held in the low four bytes of a V4-in-V6 form.
    pub fn embedded_v4(&self) -> Option<Address> {
        match self {
            Address::V6(bytes) if self.is_v4_in_v6() => {
                let mut octets = [0u8; 4];
                octets.copy_from_slice(&bytes[12..]);
                Some(Address::V4(octets))
            }
            _ => None,
        }
    }

    /// Zero every bit after the `prefix_len`-th. `prefix_len` equal to
    /// the full width is the identity.
    pub fn mask(self, prefix_len: u8) -> Self {
        match self {
            Address::V4(bytes) => {
                let mask = match prefix_len {
                    0 => 0,
                    p if p >= 32 => u32::MAX,
                    p => u32::MAX << (32 - p as u32),
                };
                Address::V4((u32::from_be_bytes(bytes) & mask).to_be_bytes())
            }
            Address::V6(bytes) => {
                let mask = match prefix_len {
                    0 => 0,
                    p if p >= 128 => u128::MAX,
                    p => u128::MAX << (128 - p as u32),
                };
                Address::V6((u128::from_be_bytes(bytes) & mask).to_be_bytes())
            }
        }
    }

    /// The network this address belongs to at `prefix_len`. A V4-in-V6
    /// address with `prefix_len >= 96` collapses to the embedded IPv4
    /// network with the prefix adjusted down by 96.
    pub fn network(self, prefix_len: u8) -> Network {
        let masked = self.mask(prefix_len);
        if prefix_len >= 96 {
            if let Some(v4) = masked.embedded_v4() {
                return Network {
                    ip: v4.to_ip(),
                    prefix_len: prefix_len - 96,
                };
            }
        }
        Network {
            ip: masked.to_ip(),
            prefix_len,
        }
    }
}

/// A network: address plus prefix length.
///
/// Formats as dotted-quad `/N` for IPv4 and as eight zero-padded
/// 16-bit hex groups `/N` for IPv6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Network {
    /// Network address
    pub ip: IpAddr,
    /// Prefix length in bits
    pub prefix_len: u8,
}

impl Network {
    /// All IPv4 addresses, `0.0.0.0/0`.
    pub const ALL_V4: Network = Network {
        ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        prefix_len: 0,
    };

    /// All IPv6 addresses, `::/0`.
    pub const ALL_V6: Network = Network {
        ip: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        prefix_len: 0,
    };

    /// Create a network, validating the prefix against the address
    /// width.
    pub fn new(ip: IpAddr, prefix_len: u8) -> Result<Self> {
        let width = if ip.is_ipv4() { 32 } else { 128 };
        if prefix_len > width {
            return Err(Error::InvalidPrefixLen);
        }
        Ok(Network { ip, prefix_len })
    }

    /// Parse `a.b.c.d[/p]` or `h:…:h[/p]`. A missing prefix means the
    /// full address width.
    pub fn parse(text: &str) -> Result<Self> {
        let (addr, prefix) = match text.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (text, None),
        };
        let ip: IpAddr = addr
            .parse()
            .map_err(|_| Error::InvalidIpAddress(text.to_string()))?;
        let prefix_len = match prefix {
            Some(p) => p
                .parse::<u8>()
                .map_err(|_| Error::InvalidIpAddress(text.to_string()))?,
            None => {
                if ip.is_ipv4() {
                    32
                } else {
                    128
                }
            }
        };
        Network::new(ip, prefix_len)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            IpAddr::V4(addr) => write!(f, "{}/{}", addr, self.prefix_len),
            IpAddr::V6(addr) => {
                let s = addr.segments();
                write!(
                    f,
                    "{:04x}:{:04x}:{:04x}:{:04x}:{:04x}:{:04x}:{:04x}:{:04x}/{}",
                    s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7], self.prefix_len
                )
            }
        }
    }
}
