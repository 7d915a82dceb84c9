//! Inbound routing — turns relay messages into peer requests or correlated
//! responses.

use futures::Stream;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::diagnostics::Diagnostics;
use crate::error::RelayError;
use crate::history::HistoryEntry;
use crate::ledger::RequestLedger;
use crate::request::{JsonRpcResponse, WcRequest};
use crate::serializer::JsonRpcSerializer;
use crate::transport::RelayMessage;

/// A decoded message from a peer.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// The peer sent a request; answer it with one of the `respond_*` calls.
    Request(WcRequest),
    /// The peer answered one of our requests.
    Response {
        entry: HistoryEntry,
        response: JsonRpcResponse,
    },
}

#[derive(Clone)]
pub struct InboundRouter {
    serializer: Arc<dyn JsonRpcSerializer>,
    ledger: RequestLedger,
    diagnostics: Arc<dyn Diagnostics>,
}

impl InboundRouter {
    pub fn new(
        serializer: Arc<dyn JsonRpcSerializer>,
        ledger: RequestLedger,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            serializer,
            ledger,
            diagnostics,
        }
    }

    /// Decode and classify a single relay message.
    pub fn route(&self, msg: &RelayMessage) -> Result<Inbound, RelayError> {
        let text = self.serializer.decode(&msg.message, &msg.topic)?;
        let value: Value =
            serde_json::from_str(&text).map_err(|e| RelayError::Decode(e.to_string()))?;

        if let Some(method) = value.get("method").and_then(|m| m.as_str()) {
            let id = value
                .get("id")
                .and_then(|id| id.as_u64())
                .ok_or_else(|| RelayError::Decode(format!("request {method} has no numeric id")))?;
            return Ok(Inbound::Request(WcRequest {
                id,
                topic: msg.topic.clone(),
                method: method.to_string(),
                params: value.get("params").cloned().unwrap_or(Value::Null),
            }));
        }

        let response: JsonRpcResponse =
            serde_json::from_value(value).map_err(|e| RelayError::Decode(e.to_string()))?;
        let id = response.id();
        let entry = self
            .ledger
            .correlate_response(id, &response)
            .ok_or(RelayError::UnknownCorrelation(id))?;
        Ok(Inbound::Response { entry, response })
    }

    /// Route every message from `messages`, reporting and skipping the ones
    /// that cannot be routed.
    pub fn into_stream(
        self,
        messages: broadcast::Receiver<RelayMessage>,
    ) -> impl Stream<Item = Inbound> + Send + 'static {
        futures::stream::unfold((self, messages), |(router, mut messages)| async move {
            loop {
                let msg = match messages.recv().await {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "inbound router lagged behind relay messages");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                };
                match router.route(&msg) {
                    Ok(inbound) => return Some((inbound, (router, messages))),
                    Err(e @ RelayError::UnknownCorrelation(_)) => {
                        router.diagnostics.log(&format!("{e} on {}", msg.topic));
                    }
                    Err(e) => {
                        router.diagnostics.error(&format!("dropping message on {}: {e}", msg.topic));
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for InboundRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundRouter").finish_non_exhaustive()
    }
}
