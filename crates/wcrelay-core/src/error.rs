//! Transport and relayer error types.

use thiserror::Error;

use crate::request::JsonRpcError;
use crate::topic::Topic;

/// Errors reported by a relay transport while acknowledging an operation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// WebSocket connection/send/receive error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// JSON-RPC error returned by the relay server.
    #[error("Relay error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// The transport task has shut down.
    #[error("Transport closed")]
    Closed,

    /// No connection is currently established.
    #[error("Not connected")]
    NotConnected,

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

/// Errors surfaced by the relayer to callbacks and diagnostics.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The transport failed to acknowledge a publish.
    #[error("Publish on {topic} failed: {source}")]
    Publish {
        topic: Topic,
        #[source]
        source: TransportError,
    },

    /// The transport failed to acknowledge a subscribe.
    #[error("Subscribe to {topic} failed: {source}")]
    Subscribe {
        topic: Topic,
        #[source]
        source: TransportError,
    },

    /// An inbound payload could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A response arrived for a request id the ledger does not know.
    #[error("No request recorded for response id {0}")]
    UnknownCorrelation(u64),
}

/// A fatal connection failure observed on the transport event stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Connection failed: {cause}")]
pub struct ConnectionFailure {
    pub cause: String,
}

impl ConnectionFailure {
    pub fn new(cause: impl Into<String>) -> Self {
        Self { cause: cause.into() }
    }
}
