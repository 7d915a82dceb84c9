//! wcrelay-core — the relay client between peers and a pub/sub transport.
//!
//! # Overview
//!
//! The core turns raw transport events into a dependable JSON-RPC
//! request/response exchange:
//!
//! - [`RequestLedger`] — idempotent admission of outbound requests
//! - [`AckDispatcher`] — one publish, exactly one of success/failure
//! - [`ConnectionHealthTracker`] — de-duplicated "connection open" signal
//! - [`InitializationErrorReporter`] — fatal connection failures
//! - [`Relayer`] — the facade combining all of the above
//!
//! The transport, serializer, history store and diagnostics sink are
//! collaborators behind the [`RelayTransport`], [`JsonRpcSerializer`],
//! [`JsonRpcHistory`] and [`Diagnostics`] traits.

pub mod config;
pub mod diagnostics;
pub mod dispatcher;
pub mod error;
pub mod health;
pub mod history;
pub mod inbound;
pub mod init_errors;
pub mod ledger;
pub mod relayer;
pub mod request;
pub mod serializer;
pub mod topic;
pub mod transport;

pub use config::RelayerConfig;
pub use diagnostics::{Diagnostics, TracingDiagnostics};
pub use dispatcher::{AckCallbacks, AckDispatcher, Delivery};
pub use error::{ConnectionFailure, RelayError, TransportError};
pub use health::{ConnectionHealth, ConnectionHealthTracker, ConnectionState};
pub use history::{HistoryEntry, InMemoryHistory, JsonRpcHistory};
pub use inbound::{Inbound, InboundRouter};
pub use init_errors::{InitializationErrorReporter, InitializationErrors};
pub use ledger::RequestLedger;
pub use relayer::Relayer;
pub use request::{
    ClientRequest, JsonRpcError, JsonRpcResponse, PeerError, SettlementSequence, WcRequest,
};
pub use serializer::{JsonRpcSerializer, PlainJsonSerializer};
pub use topic::{SubscriptionId, Topic};
pub use transport::{PublishAck, PublishOptions, RelayMessage, RelayTransport, TransportEvent};
