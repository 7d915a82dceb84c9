//! JSON-RPC history store — the persisted form of the request ledger.
//!
//! The relayer only depends on the [`JsonRpcHistory`] trait; the storage
//! engine behind it is up to the embedding application. [`InMemoryHistory`]
//! keeps everything in RAM and is lost when the process exits.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::request::JsonRpcResponse;
use crate::topic::Topic;

/// A recorded outbound request and, once correlated, its response.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub request_id: u64,
    pub topic: Topic,
    pub method: String,
    pub body: String,
    pub response: Option<JsonRpcResponse>,
}

/// Storage contract backing the request ledger.
pub trait JsonRpcHistory: Send + Sync + 'static {
    /// Insert the request if `request_id` is unknown. Returns `false` (and
    /// leaves the store untouched) when the id was already recorded.
    fn set_request(&self, request_id: u64, topic: &Topic, method: &str, body: &str) -> bool;

    /// Attach `response` to the recorded request and return the updated entry,
    /// or `None` when no request with that id exists.
    fn update_request_with_response(
        &self,
        request_id: u64,
        response: &JsonRpcResponse,
    ) -> Option<HistoryEntry>;

    fn get_request(&self, request_id: u64) -> Option<HistoryEntry>;

    /// All requests recorded on `topic`, ordered by request id.
    fn requests_for_topic(&self, topic: &Topic) -> Vec<HistoryEntry>;

    /// Forget every request recorded on `topic`.
    fn delete_requests(&self, topic: &Topic);
}

/// In-memory history store.
#[derive(Default)]
pub struct InMemoryHistory {
    entries: Mutex<HashMap<u64, HistoryEntry>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded requests.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JsonRpcHistory for InMemoryHistory {
    fn set_request(&self, request_id: u64, topic: &Topic, method: &str, body: &str) -> bool {
        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(&request_id) {
            return false;
        }
        entries.insert(
            request_id,
            HistoryEntry {
                request_id,
                topic: topic.clone(),
                method: method.to_string(),
                body: body.to_string(),
                response: None,
            },
        );
        true
    }

    fn update_request_with_response(
        &self,
        request_id: u64,
        response: &JsonRpcResponse,
    ) -> Option<HistoryEntry> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.get_mut(&request_id)?;
        entry.response = Some(response.clone());
        Some(entry.clone())
    }

    fn get_request(&self, request_id: u64) -> Option<HistoryEntry> {
        self.entries.lock().unwrap().get(&request_id).cloned()
    }

    fn requests_for_topic(&self, topic: &Topic) -> Vec<HistoryEntry> {
        let mut found: Vec<HistoryEntry> = self
            .entries
            .lock()
            .unwrap()
            .values()
            .filter(|e| &e.topic == topic)
            .cloned()
            .collect();
        found.sort_by_key(|e| e.request_id);
        found
    }

    fn delete_requests(&self, topic: &Topic) {
        self.entries.lock().unwrap().retain(|_, e| &e.topic != topic);
    }
}
