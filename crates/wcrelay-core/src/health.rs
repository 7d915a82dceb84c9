//! Connection health — a de-duplicated "is the relay connected" signal
//! derived from the transport event stream.
//!
//! State transitions:
//! - `Closed` → `Open`:   `Opened`
//! - `Open` → `Closed`:   `Closed` or `Failed`
//!
//! Every other event leaves the state untouched, and repeating the event that
//! produced the current state emits nothing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::Stream;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::transport::TransportEvent;

/// Pure connection state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionState {
    open: bool,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Apply `event`; returns `true` if the state changed.
    pub fn apply(&mut self, event: &TransportEvent) -> bool {
        let next = match event {
            TransportEvent::Opened => true,
            TransportEvent::Closed | TransportEvent::Failed(_) => false,
            TransportEvent::MessageReceived(_) | TransportEvent::Closing => return false,
        };
        if next == self.open {
            return false;
        }
        self.open = next;
        true
    }
}

/// Read-only view of the connection state.
///
/// Each view remembers the last value it handed out, so a burst of
/// transitions that ends where it started is never reported as a repeat.
#[derive(Debug, Clone)]
pub struct ConnectionHealth {
    rx: watch::Receiver<bool>,
    last_seen: bool,
}

impl ConnectionHealth {
    /// Current value; never blocks.
    pub fn is_open(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the state differs from the last value this view returned.
    /// Returns `None` once the tracker has shut down.
    pub async fn changed(&mut self) -> Option<bool> {
        loop {
            self.rx.changed().await.ok()?;
            let open = *self.rx.borrow_and_update();
            if open != self.last_seen {
                self.last_seen = open;
                return Some(open);
            }
        }
    }

    /// Current value followed by every subsequent distinct value.
    pub fn stream(&self) -> impl Stream<Item = bool> + Send + 'static {
        let mut rx = self.rx.clone();
        rx.mark_changed();
        futures::stream::unfold((rx, None), |(mut rx, last)| async move {
            loop {
                rx.changed().await.ok()?;
                let open = *rx.borrow_and_update();
                if last != Some(open) {
                    return Some((open, (rx, Some(open))));
                }
            }
        })
    }
}

/// Owns the event subscription that keeps [`ConnectionHealth`] current,
/// whether or not anyone is observing it.
#[derive(Debug)]
pub struct ConnectionHealthTracker {
    rx: watch::Receiver<bool>,
    transitions: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl ConnectionHealthTracker {
    /// Start tracking. Must be called within a Tokio runtime.
    pub fn spawn(mut events: broadcast::Receiver<TransportEvent>) -> Self {
        let (tx, rx) = watch::channel(false);
        let transitions = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&transitions);

        let task = tokio::spawn(async move {
            let mut state = ConnectionState::default();
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "connection health lagged behind transport events");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if !state.apply(&event) {
                    continue;
                }
                let open = state.is_open();
                tx.send_if_modified(|current| {
                    if *current == open {
                        return false;
                    }
                    *current = open;
                    true
                });
                counter.fetch_add(1, Ordering::Relaxed);
                tracing::info!(open, event = %event, "connection state changed");
            }
            tracing::debug!("transport event stream ended");
        });

        Self { rx, transitions, task }
    }

    pub fn health(&self) -> ConnectionHealth {
        let mut rx = self.rx.clone();
        let last_seen = *rx.borrow_and_update();
        ConnectionHealth { rx, last_seen }
    }

    pub fn is_open(&self) -> bool {
        *self.rx.borrow()
    }

    /// Number of state changes emitted so far.
    pub fn transitions(&self) -> u64 {
        self.transitions.load(Ordering::Relaxed)
    }

    /// Stop consuming transport events. The last state stays readable.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for ConnectionHealthTracker {
    fn drop(&mut self) {
        self.task.abort();
    }
}
