//! Error types for mdns-mesh.

use thiserror::Error;

/// Errors that can occur while configuring or running the bridge.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A filter pattern failed to compile.
    #[error("invalid filter pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },

    /// Failed to parse a DNS message.
    #[error("failed to parse DNS message: {0}")]
    Parse(String),

    /// Network I/O error.
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),

    /// Interface named in the monitor list was not found or is unusable.
    #[error("interface not found: {0}")]
    InterfaceNotFound(String),

    /// No multicast-capable interface matched the configuration.
    #[error("no usable multicast interface")]
    NoInterfaces,

    /// No sender identity could be resolved.
    #[error("unable to determine a sender identity; provide --unique-id")]
    Identity,

    /// Invalid broker URI.
    #[error("invalid broker URI '{uri}': {reason}")]
    BrokerUri { uri: String, reason: String },

    /// Broker client error.
    #[error("broker error: {0}")]
    Broker(String),
}

/// Result type alias for mdns-mesh operations.
pub type Result<T> = std::result::Result<T, Error>;
