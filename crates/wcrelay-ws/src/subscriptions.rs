//! Topic subscription bookkeeping.
//!
//! Tracks which topics are subscribed and under which relay subscription id,
//! so they can be re-subscribed when the WebSocket connection is
//! re-established after a disconnect.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use wcrelay_core::{SubscriptionId, Topic};

/// Shared map of topic → current relay subscription id.
#[derive(Clone, Default)]
pub struct SubscriptionManager {
    entries: Arc<Mutex<HashMap<Topic, SubscriptionId>>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or replace) the subscription id for `topic`.
    pub fn register(&self, topic: Topic, id: SubscriptionId) {
        self.entries.lock().unwrap().insert(topic, id);
    }

    /// Forget `topic`.
    pub fn remove(&self, topic: &Topic) {
        self.entries.lock().unwrap().remove(topic);
    }

    pub fn get(&self, topic: &Topic) -> Option<SubscriptionId> {
        self.entries.lock().unwrap().get(topic).cloned()
    }

    /// Topics to re-subscribe after reconnect.
    pub fn active_topics(&self) -> Vec<Topic> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }

    /// Number of active subscriptions.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Returns `true` if there are no active subscriptions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
