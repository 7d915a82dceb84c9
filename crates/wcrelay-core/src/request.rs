//! JSON-RPC 2.0 wire types exchanged between peers over the relay.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::topic::Topic;

pub const JSONRPC_VERSION: &str = "2.0";

static ENTROPY: AtomicU64 = AtomicU64::new(0);

/// Generate a request id: epoch milliseconds with three digits of entropy.
pub fn payload_id() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    millis * 1000 + ENTROPY.fetch_add(1, Ordering::Relaxed) % 1000
}

/// An outbound JSON-RPC request defined by the protocol layer.
///
/// The relayer only needs the id (ledger key), the method (recorded in the
/// ledger) and the params to build the wire payload.
pub trait SettlementSequence: Send + Sync {
    fn id(&self) -> u64;
    fn method(&self) -> &str;
    fn params(&self) -> Value;
}

/// A generic outbound request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRequest {
    pub id: u64,
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
}

impl ClientRequest {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self::with_id(payload_id(), method, params)
    }

    pub fn with_id(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            id,
            jsonrpc: JSONRPC_VERSION.into(),
            method: method.into(),
            params,
        }
    }
}

impl SettlementSequence for ClientRequest {
    fn id(&self) -> u64 {
        self.id
    }

    fn method(&self) -> &str {
        &self.method
    }

    fn params(&self) -> Value {
        self.params.clone()
    }
}

/// A request received from a peer on `topic`.
#[derive(Debug, Clone, PartialEq)]
pub struct WcRequest {
    pub id: u64,
    pub topic: Topic,
    pub method: String,
    pub params: Value,
}

/// Application-level error reported back to a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerError {
    pub code: i64,
    pub message: String,
}

impl PeerError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl From<&PeerError> for JsonRpcError {
    fn from(e: &PeerError) -> Self {
        Self {
            code: e.code,
            message: e.message.clone(),
        }
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

/// Successful response payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResult {
    pub id: u64,
    pub jsonrpc: String,
    pub result: Value,
}

/// Error response payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorResponse {
    pub id: u64,
    pub jsonrpc: String,
    pub error: JsonRpcError,
}

/// A JSON-RPC 2.0 response: either a result or an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcResponse {
    Result(JsonRpcResult),
    Error(JsonRpcErrorResponse),
}

impl JsonRpcResponse {
    pub fn result(id: u64, result: Value) -> Self {
        Self::Result(JsonRpcResult {
            id,
            jsonrpc: JSONRPC_VERSION.into(),
            result,
        })
    }

    pub fn error(id: u64, error: JsonRpcError) -> Self {
        Self::Error(JsonRpcErrorResponse {
            id,
            jsonrpc: JSONRPC_VERSION.into(),
            error,
        })
    }

    pub fn id(&self) -> u64 {
        match self {
            Self::Result(r) => r.id,
            Self::Error(e) => e.id,
        }
    }

    /// Returns `true` if this is a successful response.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Result(_))
    }
}
