//! Network interface discovery and multicast socket management.

pub mod interface;
pub mod socket;

pub use interface::{build_transmit, select_interfaces, Interface, TransmitDescriptor};
pub use socket::{open_listener, recv_with_meta, send_multicast, PacketMeta};
