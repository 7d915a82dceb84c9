//! The `RelayTransport` trait — the pub/sub collaborator the relayer drives.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::TransportError;
use crate::topic::{SubscriptionId, Topic};

/// Connection lifecycle events produced by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    MessageReceived(String),
    Closing,
    Closed,
    Failed(String),
}

impl std::fmt::Display for TransportEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opened => write!(f, "opened"),
            Self::MessageReceived(_) => write!(f, "message"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
            Self::Failed(cause) => write!(f, "failed: {cause}"),
        }
    }
}

/// A payload delivered on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayMessage {
    pub subscription_id: SubscriptionId,
    pub topic: Topic,
    pub message: String,
}

/// Parameters attached to a publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOptions {
    /// Seconds the relay keeps the message for offline subscribers.
    pub ttl_secs: u64,
    /// Ask the receiving wallet to prompt the user.
    pub prompt: bool,
    /// Relay tag classifying the message.
    pub tag: u32,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            ttl_secs: 6 * 60 * 60,
            prompt: false,
            tag: 0,
        }
    }
}

/// Acknowledgement returned by the relay for a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishAck {
    /// Relay-level request id of the publish call.
    pub relay_id: u64,
}

/// The pub/sub transport every relay backend implements.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` for use across Tokio tasks.
///
/// # Object Safety
/// The trait is object-safe and can be stored as `Arc<dyn RelayTransport>`.
#[async_trait]
pub trait RelayTransport: Send + Sync + 'static {
    /// Publish `message` on `topic`; resolves when the relay acknowledges.
    async fn publish(
        &self,
        topic: &Topic,
        message: String,
        options: PublishOptions,
    ) -> Result<PublishAck, TransportError>;

    /// Subscribe to `topic`; resolves with the relay's subscription id.
    async fn subscribe(&self, topic: &Topic) -> Result<SubscriptionId, TransportError>;

    /// Cancel a subscription.
    async fn unsubscribe(
        &self,
        topic: &Topic,
        subscription_id: &SubscriptionId,
    ) -> Result<(), TransportError>;

    /// A fresh receiver on the connection event broadcast.
    fn events(&self) -> broadcast::Receiver<TransportEvent>;

    /// A fresh receiver on messages delivered for subscribed topics.
    fn messages(&self) -> broadcast::Receiver<RelayMessage>;
}
