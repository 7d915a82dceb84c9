//! Acknowledgement dispatcher — one publish, exactly one outcome.
//!
//! Each publish resolves to either `on_success()` or `on_failure(err)`, never
//! both and never twice. Requests are gated on the [`RequestLedger`]: a
//! request id that was already admitted is skipped without any callback.
//! Responses are published unconditionally.

use std::sync::Arc;

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::RelayerConfig;
use crate::diagnostics::Diagnostics;
use crate::error::RelayError;
use crate::ledger::RequestLedger;
use crate::request::{JsonRpcError, JsonRpcResponse, PeerError, SettlementSequence, WcRequest};
use crate::serializer::JsonRpcSerializer;
use crate::topic::Topic;
use crate::transport::{PublishAck, PublishOptions, RelayTransport};

type OnSuccess = Box<dyn FnOnce() + Send + 'static>;
type OnFailure = Box<dyn FnOnce(RelayError) + Send + 'static>;

/// Optional success/failure callbacks for a single publish.
#[derive(Default)]
pub struct AckCallbacks {
    on_success: Option<OnSuccess>,
    on_failure: Option<OnFailure>,
}

impl AckCallbacks {
    pub fn new(
        on_success: impl FnOnce() + Send + 'static,
        on_failure: impl FnOnce(RelayError) + Send + 'static,
    ) -> Self {
        Self {
            on_success: Some(Box::new(on_success)),
            on_failure: Some(Box::new(on_failure)),
        }
    }

    /// No-op callbacks.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn on_success(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    pub fn on_failure(mut self, f: impl FnOnce(RelayError) + Send + 'static) -> Self {
        self.on_failure = Some(Box::new(f));
        self
    }

    fn complete(self, result: Result<PublishAck, RelayError>) {
        match result {
            Ok(_) => {
                if let Some(f) = self.on_success {
                    f();
                }
            }
            Err(e) => {
                if let Some(f) = self.on_failure {
                    f(e);
                }
            }
        }
    }
}

impl std::fmt::Debug for AckCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AckCallbacks")
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

/// Outcome of an awaited request publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The relay acknowledged the publish.
    Acknowledged(PublishAck),
    /// The request id was already in the ledger; nothing was sent.
    Skipped,
}

#[derive(Clone)]
pub struct AckDispatcher {
    transport: Arc<dyn RelayTransport>,
    serializer: Arc<dyn JsonRpcSerializer>,
    ledger: RequestLedger,
    diagnostics: Arc<dyn Diagnostics>,
    config: RelayerConfig,
    runtime: Handle,
}

impl AckDispatcher {
    /// Must be called within a Tokio runtime; acknowledgement tasks are
    /// spawned on that runtime regardless of the publishing thread.
    pub fn new(
        transport: Arc<dyn RelayTransport>,
        serializer: Arc<dyn JsonRpcSerializer>,
        ledger: RequestLedger,
        diagnostics: Arc<dyn Diagnostics>,
        config: RelayerConfig,
    ) -> Self {
        Self {
            transport,
            serializer,
            ledger,
            diagnostics,
            config,
            runtime: Handle::current(),
        }
    }

    /// Publish a request and report the acknowledgement through `callbacks`.
    ///
    /// Returns `None` when the ledger already holds `sequence.id()`; neither
    /// callback will ever run in that case. Otherwise returns the handle of
    /// the task awaiting the acknowledgement.
    pub fn publish_request(
        &self,
        topic: &Topic,
        sequence: &dyn SettlementSequence,
        callbacks: AckCallbacks,
    ) -> Option<JoinHandle<()>> {
        let message = self.admit(topic, sequence)?;
        Some(self.spawn_publish(topic.clone(), message, self.config.request_options(), callbacks))
    }

    /// Publish a response. Responses bypass the ledger.
    pub fn publish_response(
        &self,
        topic: &Topic,
        response: &JsonRpcResponse,
        callbacks: AckCallbacks,
    ) -> JoinHandle<()> {
        let message = self.encode_response(topic, response);
        self.spawn_publish(topic.clone(), message, self.config.response_options(), callbacks)
    }

    /// Awaitable form of [`publish_request`](Self::publish_request).
    pub async fn send_request(
        &self,
        topic: &Topic,
        sequence: &dyn SettlementSequence,
    ) -> Result<Delivery, RelayError> {
        let Some(message) = self.admit(topic, sequence) else {
            return Ok(Delivery::Skipped);
        };
        self.publish(topic, message, self.config.request_options())
            .await
            .map(Delivery::Acknowledged)
    }

    /// Awaitable form of [`publish_response`](Self::publish_response).
    pub async fn send_response(
        &self,
        topic: &Topic,
        response: &JsonRpcResponse,
    ) -> Result<PublishAck, RelayError> {
        let message = self.encode_response(topic, response);
        self.publish(topic, message, self.config.response_options()).await
    }

    pub fn respond_with_result(
        &self,
        request: &WcRequest,
        result: Value,
        callbacks: AckCallbacks,
    ) -> JoinHandle<()> {
        let response = JsonRpcResponse::result(request.id, result);
        self.publish_response(&request.topic, &response, callbacks)
    }

    pub fn respond_with_success(&self, request: &WcRequest, callbacks: AckCallbacks) -> JoinHandle<()> {
        self.respond_with_result(request, Value::Bool(true), callbacks)
    }

    pub fn respond_with_error(
        &self,
        request: &WcRequest,
        error: &PeerError,
        callbacks: AckCallbacks,
    ) -> JoinHandle<()> {
        let response = JsonRpcResponse::error(request.id, JsonRpcError::from(error));
        self.publish_response(&request.topic, &response, callbacks)
    }

    /// Serialize, run the ledger admission check, and encode for the topic.
    fn admit(&self, topic: &Topic, sequence: &dyn SettlementSequence) -> Option<String> {
        let body = self.serializer.serialize(sequence);
        if !self
            .ledger
            .record_if_new(sequence.id(), topic, sequence.method(), &body)
        {
            return None;
        }
        Some(self.serializer.encode(&body, topic))
    }

    fn encode_response(&self, topic: &Topic, response: &JsonRpcResponse) -> String {
        let body = self.serializer.serialize_response(response);
        self.serializer.encode(&body, topic)
    }

    fn spawn_publish(
        &self,
        topic: Topic,
        message: String,
        options: PublishOptions,
        callbacks: AckCallbacks,
    ) -> JoinHandle<()> {
        let this = self.clone();
        self.runtime.spawn(async move {
            let result = this.publish(&topic, message, options).await;
            callbacks.complete(result);
        })
    }

    async fn publish(
        &self,
        topic: &Topic,
        message: String,
        options: PublishOptions,
    ) -> Result<PublishAck, RelayError> {
        match self.transport.publish(topic, message, options).await {
            Ok(ack) => {
                tracing::debug!(topic = %topic, relay_id = ack.relay_id, "publish acknowledged");
                Ok(ack)
            }
            Err(source) => {
                let err = RelayError::Publish {
                    topic: topic.clone(),
                    source,
                };
                self.diagnostics.error(&err.to_string());
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for AckDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AckDispatcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
