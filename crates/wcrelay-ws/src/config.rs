//! WebSocket relay transport configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for [`WsRelayTransport`](crate::WsRelayTransport).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsRelayConfig {
    /// Relay endpoint, e.g. "wss://relay.walletconnect.com"
    pub url: String,
    /// Project id appended as `?projectId=` when set
    #[serde(default)]
    pub project_id: Option<String>,
    /// Relay JSON-RPC method prefix (`irn_publish`, `irn_subscribe`, ...)
    #[serde(default = "default_method_prefix")]
    pub method_prefix: String,
    /// Initial reconnect backoff in milliseconds
    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,
    /// Maximum reconnect backoff in milliseconds
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
    /// Capacity of the event and message broadcast channels
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_method_prefix() -> String { "irn".into() }
fn default_reconnect_initial_ms() -> u64 { 500 }
fn default_reconnect_max_ms() -> u64 { 60_000 }
fn default_channel_capacity() -> usize { 256 }

impl WsRelayConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            project_id: None,
            method_prefix: default_method_prefix(),
            reconnect_initial_ms: default_reconnect_initial_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// URL actually dialled.
    pub fn endpoint(&self) -> String {
        match &self.project_id {
            Some(id) => {
                let sep = if self.url.contains('?') { '&' } else { '?' };
                format!("{}{sep}projectId={id}", self.url)
            }
            None => self.url.clone(),
        }
    }

    pub fn reconnect_initial(&self) -> Duration {
        Duration::from_millis(self.reconnect_initial_ms)
    }

    pub fn reconnect_max(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms)
    }
}
