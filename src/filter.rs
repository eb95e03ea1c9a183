//! Filter compilation and label matching.
//!
//! Two independent matcher sets are compiled from the configuration: the
//! allow-or-deny label filters deciding whether a packet crosses the bridge
//! at all, and the port filters deciding which socket a mesh packet is
//! rebroadcast from.

use regex::Regex;

use crate::config::BridgeConfig;
use crate::error::{Error, Result};
use crate::mdns::DnsMessage;

/// Compiled filter state derived from the configuration.
#[derive(Debug)]
pub struct CompiledFilters {
    port: Vec<Regex>,
    label: Vec<Regex>,
    deny_mode: bool,
}

impl CompiledFilters {
    /// Compile the port and allow/deny filters.
    ///
    /// Allow and deny lists are mutually exclusive; every pattern compiles
    /// independently and any failure aborts with the offending pattern
    /// named. No partial state escapes.
    pub fn compile(config: &BridgeConfig) -> Result<Self> {
        if !config.allow_filter.is_empty() && !config.deny_filter.is_empty() {
            return Err(Error::Config(
                "allow-filter and deny-filter cannot be used together".to_string(),
            ));
        }

        let port = compile_patterns(&config.port_filter)?;

        let (patterns, deny_mode) = if config.deny_filter.is_empty() {
            (&config.allow_filter, false)
        } else {
            (&config.deny_filter, true)
        };
        let label = compile_patterns(patterns)?;

        Ok(Self {
            port,
            label,
            deny_mode,
        })
    }

    /// True iff `deny_filter` supplied the label patterns.
    pub fn deny_mode(&self) -> bool {
        self.deny_mode
    }

    /// Whether the label filters say to discard this message.
    ///
    /// Deny mode discards on a match; allow mode discards when patterns are
    /// configured and none match. No patterns means pass all.
    pub fn discard(&self, msg: &DnsMessage) -> bool {
        if self.deny_mode {
            label_match(msg, &self.label)
        } else {
            !self.label.is_empty() && !label_match(msg, &self.label)
        }
    }

    /// Whether the port filters classify this message as port-filtered.
    pub fn port_match(&self, msg: &DnsMessage) -> bool {
        label_match(msg, &self.port)
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| Error::Pattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

/// True iff some regex matches the trailing-dot-stripped name of some
/// question or answer in the message.
pub fn label_match(msg: &DnsMessage, patterns: &[Regex]) -> bool {
    patterns.iter().any(|r| {
        msg.filter_names()
            .any(|name| r.is_match(name.strip_suffix('.').unwrap_or(name)))
    })
}
