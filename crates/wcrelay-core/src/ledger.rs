//! Request ledger — idempotent admission of outbound requests and
//! correlation of inbound responses.

use std::sync::{Arc, Mutex};

use crate::history::{HistoryEntry, JsonRpcHistory};
use crate::request::JsonRpcResponse;
use crate::topic::Topic;

/// Serializes all access to the history store so that check-and-insert is
/// atomic even when the store itself is not.
#[derive(Clone)]
pub struct RequestLedger {
    history: Arc<dyn JsonRpcHistory>,
    gate: Arc<Mutex<()>>,
}

impl RequestLedger {
    pub fn new(history: Arc<dyn JsonRpcHistory>) -> Self {
        Self {
            history,
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Returns `true` exactly once per `request_id`.
    pub fn record_if_new(&self, request_id: u64, topic: &Topic, method: &str, body: &str) -> bool {
        let _guard = self.gate.lock().unwrap();
        self.history.set_request(request_id, topic, method, body)
    }

    /// Match `response` to a recorded request. `None` means unknown correlation.
    pub fn correlate_response(
        &self,
        request_id: u64,
        response: &JsonRpcResponse,
    ) -> Option<HistoryEntry> {
        let _guard = self.gate.lock().unwrap();
        self.history.update_request_with_response(request_id, response)
    }

    pub fn history(&self) -> &Arc<dyn JsonRpcHistory> {
        &self.history
    }
}

impl std::fmt::Debug for RequestLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestLedger").finish_non_exhaustive()
    }
}
