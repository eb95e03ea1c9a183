//! Sender-identity resolution.
//!
//! Every bridge publishes under a stable per-instance identifier; envelopes
//! arriving with our own identifier are discarded, which is the only thing
//! keeping a bridge from re-emitting its own traffic.

use tracing::{info, warn};

use crate::config::BridgeConfig;
use crate::error::{Error, Result};

/// Files holding the systemd/dbus machine id.
const MACHINE_ID_PATHS: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// Resolve the unique sender identifier for this instance.
///
/// Preference order: the configured override, the machine id, the hostname.
/// Failing all three is fatal.
pub fn resolve(config: &BridgeConfig) -> Result<String> {
    if let Some(id) = config.unique_id.as_deref() {
        if !id.is_empty() {
            warn!(
                "Using provided unique sender ID. If shared with other instances \
                 this could cause a self-DoS"
            );
            return Ok(id.to_string());
        }
    }

    if let Some(id) = machine_id() {
        return Ok(id);
    }

    info!("No machine id found, using hostname as sender id");
    match gethostname::gethostname().into_string() {
        Ok(hostname) if !hostname.is_empty() => Ok(hostname),
        _ => Err(Error::Identity),
    }
}

fn machine_id() -> Option<String> {
    for path in MACHINE_ID_PATHS {
        if let Ok(contents) = std::fs::read_to_string(path) {
            let id = contents.trim();
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrokerUri;
    use std::net::Ipv4Addr;

    fn config_with_id(unique_id: Option<&str>) -> BridgeConfig {
        BridgeConfig {
            allow_filter: Vec::new(),
            deny_filter: Vec::new(),
            deny_ip: Vec::new(),
            filter_ttl: 0,
            high_port: false,
            listen_ip: Ipv4Addr::UNSPECIFIED,
            monitor: Vec::new(),
            port_filter: Vec::new(),
            server: BrokerUri::parse("tcp://localhost:1883").unwrap(),
            topic: "mdns".to_string(),
            unique_id: unique_id.map(|s| s.to_string()),
        }
    }

    #[test]
    fn explicit_override_wins() {
        let id = resolve(&config_with_id(Some("bridge-a"))).unwrap();
        assert_eq!(id, "bridge-a");
    }

    #[test]
    fn empty_override_is_ignored() {
        // Falls through to machine id or hostname; either way the result is
        // non-empty and not the empty override.
        let id = resolve(&config_with_id(Some(""))).unwrap();
        assert!(!id.is_empty());
    }

    #[test]
    fn resolves_without_override() {
        // Any Linux host has a machine id or a hostname.
        let id = resolve(&config_with_id(None)).unwrap();
        assert!(!id.is_empty());
    }
}
