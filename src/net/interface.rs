//! Network interface discovery and transmit descriptors.

use std::collections::HashSet;
use std::net::Ipv4Addr;

use nix::ifaddrs::getifaddrs;
use nix::libc;
use nix::net::if_::{if_nametoindex, InterfaceFlags};

use crate::error::{Error, Result};

/// A selected bridge interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    /// Interface name (e.g., "eth0").
    pub name: String,
    /// Kernel interface index.
    pub index: u32,
    /// IPv4 address assigned to the interface, used for group joins.
    pub addr: Ipv4Addr,
}

impl std::fmt::Display for Interface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "dev {} index {} addr {}", self.name, self.index, self.addr)
    }
}

/// Enumerate interfaces eligible for bridging.
///
/// An interface qualifies when it is up, multicast-capable, carries an IPv4
/// address, and either appears in the monitor list or (with an empty monitor
/// list) is not loopback. A monitor entry that matches nothing is a startup
/// error, as is an empty result.
pub fn select_interfaces(monitor: &[String]) -> Result<Vec<Interface>> {
    let addrs = getifaddrs().map_err(|e| Error::Network(std::io::Error::other(e)))?;

    let mut interfaces: Vec<Interface> = Vec::new();
    let mut selected: HashSet<String> = HashSet::new();

    for ifaddr in addrs {
        let name = &ifaddr.interface_name;
        if selected.contains(name) {
            continue;
        }

        let flags = ifaddr.flags;
        if !flags.contains(InterfaceFlags::IFF_UP)
            || !flags.contains(InterfaceFlags::IFF_MULTICAST)
        {
            continue;
        }

        if monitor.is_empty() {
            if flags.contains(InterfaceFlags::IFF_LOOPBACK) {
                continue;
            }
        } else if !monitor.iter().any(|m| m == name) {
            continue;
        }

        let Some(addr) = ifaddr.address else {
            continue;
        };
        let Some(sin) = addr.as_sockaddr_in() else {
            continue;
        };

        let index = if_nametoindex(name.as_str())
            .map_err(|e| Error::Network(std::io::Error::other(e)))?;

        selected.insert(name.clone());
        interfaces.push(Interface {
            name: name.clone(),
            index,
            addr: sin.ip(),
        });
    }

    for wanted in monitor {
        if !selected.contains(wanted) {
            return Err(Error::InterfaceNotFound(wanted.clone()));
        }
    }

    if interfaces.is_empty() {
        return Err(Error::NoInterfaces);
    }

    Ok(interfaces)
}

/// Per-interface control block binding an outbound multicast write to a
/// specific egress interface.
#[derive(Debug, Clone)]
pub struct TransmitDescriptor {
    /// Interface name, for log messages.
    pub name: String,
    index: u32,
}

impl TransmitDescriptor {
    /// The `IP_PKTINFO` control message selecting this egress interface.
    pub fn pktinfo(&self) -> libc::in_pktinfo {
        libc::in_pktinfo {
            ipi_ifindex: self.index as libc::c_int,
            ipi_spec_dst: libc::in_addr { s_addr: 0 },
            ipi_addr: libc::in_addr { s_addr: 0 },
        }
    }
}

/// Build one transmit descriptor per selected interface, so a single logical
/// broadcast to the mesh transmits once per participating interface.
pub fn build_transmit(interfaces: &[Interface]) -> Vec<TransmitDescriptor> {
    interfaces
        .iter()
        .map(|iface| TransmitDescriptor {
            name: iface.name.clone(),
            index: iface.index,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interface_display() {
        let iface = Interface {
            name: "eth0".to_string(),
            index: 2,
            addr: Ipv4Addr::new(192, 168, 1, 100),
        };
        let shown = iface.to_string();
        assert!(shown.contains("eth0"));
        assert!(shown.contains("192.168.1.100"));
    }

    #[test]
    fn unknown_monitor_entry_is_an_error() {
        let monitor = vec!["nonexistent_interface_xyz".to_string()];
        match select_interfaces(&monitor) {
            Err(Error::InterfaceNotFound(name)) => {
                assert_eq!(name, "nonexistent_interface_xyz");
            }
            other => panic!("expected InterfaceNotFound, got {:?}", other),
        }
    }

    #[test]
    fn transmit_descriptors_carry_interface_index() {
        let interfaces = vec![
            Interface {
                name: "eth0".to_string(),
                index: 2,
                addr: Ipv4Addr::new(192, 168, 1, 100),
            },
            Interface {
                name: "wlan0".to_string(),
                index: 3,
                addr: Ipv4Addr::new(10, 0, 0, 5),
            },
        ];

        let transmits = build_transmit(&interfaces);
        assert_eq!(transmits.len(), 2);
        assert_eq!(transmits[0].pktinfo().ipi_ifindex, 2);
        assert_eq!(transmits[1].pktinfo().ipi_ifindex, 3);
        assert_eq!(transmits[1].name, "wlan0");
    }
}
