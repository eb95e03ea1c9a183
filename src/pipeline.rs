//! Per-packet decision logic for both bridge directions.
//!
//! Everything here is pure with respect to I/O: the wire→mesh path turns a
//! received datagram into an envelope to publish (or nothing), and the
//! mesh→wire path turns a broker payload into bytes to rebroadcast plus the
//! socket to send them from (or nothing). The coordinator owns the sockets
//! and the broker session.

use tracing::{debug, trace, warn};

use crate::config::BridgeConfig;
use crate::error::Result;
use crate::filter::CompiledFilters;
use crate::mdns::DnsMessage;
use crate::mesh::MeshEnvelope;
use crate::net::PacketMeta;

/// Which listener socket a rebroadcast leaves from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortClass {
    /// The well-known mDNS port (5353).
    Low,
    /// The ephemeral high port.
    High,
}

/// Select the egress socket for a mesh packet.
///
/// Port-filtered packets cross over to the opposite side of whatever this
/// instance was declared to be, so matched traffic entering on one segment's
/// high port leaves on the peer's high port while everything else stays on
/// 5353.
pub fn egress_port(high_port: bool, port_match: bool) -> PortClass {
    if high_port == port_match {
        PortClass::Low
    } else {
        PortClass::High
    }
}

/// The compiled, immutable packet-decision state shared by both directions.
#[derive(Debug)]
pub struct PacketPipeline {
    unique_id: String,
    filters: CompiledFilters,
    filter_ttl: u8,
    deny_ip: Vec<String>,
    high_port: bool,
}

impl PacketPipeline {
    /// Compile the pipeline from the configuration.
    pub fn new(config: &BridgeConfig, unique_id: String) -> Result<Self> {
        let filters = CompiledFilters::compile(config)?;
        Ok(Self {
            unique_id,
            filters,
            filter_ttl: config.filter_ttl,
            deny_ip: config.deny_ip.clone(),
            high_port: config.high_port,
        })
    }

    /// The sender identifier this instance publishes under.
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// Decide what to do with a datagram read off the wire.
    ///
    /// Returns the envelope to publish, or `None` when the packet is
    /// discarded. The envelope carries the original bytes untouched.
    pub fn wire_to_mesh(&self, data: &[u8], meta: &PacketMeta) -> Option<MeshEnvelope> {
        if meta.ttl == self.filter_ttl {
            debug!(ttl = meta.ttl, "Discarding packet with filter TTL");
            return None;
        }

        if self.ip_denied(meta) {
            debug!(src = %meta.src, "Discarding packet from denied IP");
            return None;
        }

        // An undecodable packet is filter-tested as an empty message: deny
        // mode forwards the raw bytes, allow mode drops them.
        let msg = match DnsMessage::parse(data) {
            Ok(msg) => msg,
            Err(err) => {
                warn!("Error parsing packet from wire: {}", err);
                DnsMessage::default()
            }
        };
        trace!(?msg, "Received message from wire");

        if self.filters.discard(&msg) {
            debug!(src = %meta.src, "Discarding message from wire");
            return None;
        }

        Some(MeshEnvelope {
            sender: self.unique_id.clone(),
            data: data.to_vec(),
        })
    }

    /// Decide what to do with a payload delivered from the broker.
    ///
    /// Returns the socket class and the raw bytes to rebroadcast, or `None`
    /// when the message is discarded.
    pub fn mesh_to_wire(&self, payload: &[u8]) -> Option<(PortClass, Vec<u8>)> {
        let envelope: MeshEnvelope = match serde_json::from_slice(payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!("Error unmarshalling message from mesh: {}", err);
                return None;
            }
        };

        if envelope.sender == self.unique_id {
            debug!("Ignoring mesh message from self");
            return None;
        }

        let msg = match DnsMessage::parse(&envelope.data) {
            Ok(msg) => msg,
            Err(err) => {
                warn!(sender = %envelope.sender, "Error parsing mesh packet: {}", err);
                return None;
            }
        };

        if self.filters.discard(&msg) {
            debug!(sender = %envelope.sender, "Discarding message from sender");
            return None;
        }

        let class = egress_port(self.high_port, self.filters.port_match(&msg));
        debug!(sender = %envelope.sender, ?class, "Mesh message classified");

        Some((class, envelope.data))
    }

    fn ip_denied(&self, meta: &PacketMeta) -> bool {
        if self.deny_ip.is_empty() {
            return false;
        }
        let src = meta.src.to_string();
        self.deny_ip.iter().any(|denied| *denied == src)
    }
}
