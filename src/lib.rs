//! mdns-mesh - a bidirectional mDNS-to-MQTT mesh bridge.
//!
//! This library captures mDNS packets broadcast on the local segment,
//! republishes them to a shared broker topic, and rebroadcasts packets
//! received from peers as multicast, so several disjoint network segments
//! behave as a single mDNS domain.

pub mod bridge;
pub mod broker;
pub mod config;
pub mod error;
pub mod filter;
pub mod identity;
pub mod mdns;
pub mod mesh;
pub mod net;
pub mod pipeline;

pub use bridge::Bridge;
pub use config::{BridgeConfig, BrokerUri};
pub use error::{Error, Result};
pub use filter::CompiledFilters;
pub use mdns::{DnsMessage, BUF_SIZE, MDNS_PORT, MULTICAST_GROUP};
pub use mesh::MeshEnvelope;
pub use pipeline::{PacketPipeline, PortClass};

/// Package name.
pub const PACKAGE: &str = "mdns-mesh";
