//! Initialization error reporter — surfaces fatal connection failures.
//!
//! Every subscriber gets its own receiver on the transport event broadcast
//! and only sees failures that happen after it subscribed. Dropping the
//! subscriber is the unsubscription.

use futures::Stream;
use tokio::sync::broadcast;

use crate::error::ConnectionFailure;
use crate::transport::TransportEvent;

#[derive(Debug)]
pub struct InitializationErrorReporter {
    events: broadcast::Receiver<TransportEvent>,
}

impl InitializationErrorReporter {
    pub fn new(events: broadcast::Receiver<TransportEvent>) -> Self {
        Self { events }
    }

    pub fn subscribe(&self) -> InitializationErrors {
        InitializationErrors {
            events: self.events.resubscribe(),
        }
    }
}

/// A single subscription to connection failures.
#[derive(Debug)]
pub struct InitializationErrors {
    events: broadcast::Receiver<TransportEvent>,
}

impl InitializationErrors {
    /// Wait for the next failure. Returns `None` once the transport is gone.
    pub async fn recv(&mut self) -> Option<ConnectionFailure> {
        loop {
            match self.events.recv().await {
                Ok(TransportEvent::Failed(cause)) => return Some(ConnectionFailure::new(cause)),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "initialization error subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = ConnectionFailure> + Send + 'static {
        futures::stream::unfold(self, |mut errors| async move {
            let failure = errors.recv().await?;
            Some((failure, errors))
        })
    }
}
