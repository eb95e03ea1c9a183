//! mDNS wire constants and DNS message parsing.

pub mod packet;
pub mod parser;

pub use packet::{DnsMessage, DnsQuestion, DnsRecord, RecordType};

use std::net::Ipv4Addr;

/// mDNS IPv4 multicast group.
pub const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);

/// mDNS well-known port.
pub const MDNS_PORT: u16 = 5353;

/// Receive buffer size, the maximum UDP payload.
pub const BUF_SIZE: usize = 65536;
