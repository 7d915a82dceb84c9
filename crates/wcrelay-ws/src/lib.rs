//! wcrelay-ws — WebSocket relay transport with auto-reconnect.
//!
//! # Features
//! - Relay JSON-RPC publish / subscribe / unsubscribe
//! - Acknowledges inbound subscription messages
//! - Auto-reconnect on disconnect (exponential backoff)
//! - Auto-resubscribe after reconnect
//! - Request multiplexing over a single connection

pub mod client;
pub mod config;
pub mod protocol;
pub mod subscriptions;

pub use client::WsRelayTransport;
pub use config::WsRelayConfig;
pub use protocol::{Frame, RelayProtocol};
pub use subscriptions::SubscriptionManager;
