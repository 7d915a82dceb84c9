//! `Relayer` — the public surface peers' protocol logic talks to.

use std::sync::Arc;

use futures::Stream;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::config::RelayerConfig;
use crate::diagnostics::{Diagnostics, TracingDiagnostics};
use crate::dispatcher::{AckCallbacks, AckDispatcher, Delivery};
use crate::error::RelayError;
use crate::health::{ConnectionHealth, ConnectionHealthTracker};
use crate::history::JsonRpcHistory;
use crate::inbound::{Inbound, InboundRouter};
use crate::init_errors::{InitializationErrorReporter, InitializationErrors};
use crate::ledger::RequestLedger;
use crate::request::{JsonRpcResponse, PeerError, SettlementSequence, WcRequest};
use crate::serializer::JsonRpcSerializer;
use crate::topic::{SubscriptionId, Topic};
use crate::transport::{PublishAck, RelayTransport};

/// Relay client combining the request ledger, acknowledgement dispatch,
/// connection health and initialization error reporting.
///
/// Holds no state of its own beyond wiring: admission state lives in the
/// ledger and connection state in the health tracker.
pub struct Relayer {
    transport: Arc<dyn RelayTransport>,
    dispatcher: AckDispatcher,
    router: InboundRouter,
    ledger: RequestLedger,
    health: ConnectionHealthTracker,
    init_errors: InitializationErrorReporter,
    diagnostics: Arc<dyn Diagnostics>,
}

impl Relayer {
    /// Build a relayer that reports unhandled failures through `tracing`.
    /// Must be called within a Tokio runtime.
    pub fn new(
        transport: Arc<dyn RelayTransport>,
        serializer: Arc<dyn JsonRpcSerializer>,
        history: Arc<dyn JsonRpcHistory>,
        config: RelayerConfig,
    ) -> Self {
        Self::with_diagnostics(transport, serializer, history, config, Arc::new(TracingDiagnostics))
    }

    pub fn with_diagnostics(
        transport: Arc<dyn RelayTransport>,
        serializer: Arc<dyn JsonRpcSerializer>,
        history: Arc<dyn JsonRpcHistory>,
        config: RelayerConfig,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        let ledger = RequestLedger::new(history);
        let health = ConnectionHealthTracker::spawn(transport.events());
        let init_errors = InitializationErrorReporter::new(transport.events());
        let dispatcher = AckDispatcher::new(
            Arc::clone(&transport),
            Arc::clone(&serializer),
            ledger.clone(),
            Arc::clone(&diagnostics),
            config,
        );
        let router = InboundRouter::new(serializer, ledger.clone(), Arc::clone(&diagnostics));

        Self {
            transport,
            dispatcher,
            router,
            ledger,
            health,
            init_errors,
            diagnostics,
        }
    }

    // ── Publishing ──────────────────────────────────────────────────────────

    /// Publish a request. Returns `None` (and runs no callback) if a request
    /// with the same id was already published.
    pub fn publish_request(
        &self,
        topic: &Topic,
        sequence: &dyn SettlementSequence,
        callbacks: AckCallbacks,
    ) -> Option<JoinHandle<()>> {
        self.dispatcher.publish_request(topic, sequence, callbacks)
    }

    pub fn publish_response(
        &self,
        topic: &Topic,
        response: &JsonRpcResponse,
        callbacks: AckCallbacks,
    ) -> JoinHandle<()> {
        self.dispatcher.publish_response(topic, response, callbacks)
    }

    pub async fn send_request(
        &self,
        topic: &Topic,
        sequence: &dyn SettlementSequence,
    ) -> Result<Delivery, RelayError> {
        self.dispatcher.send_request(topic, sequence).await
    }

    pub async fn send_response(
        &self,
        topic: &Topic,
        response: &JsonRpcResponse,
    ) -> Result<PublishAck, RelayError> {
        self.dispatcher.send_response(topic, response).await
    }

    pub fn respond_with_result(&self, request: &WcRequest, result: Value) -> JoinHandle<()> {
        self.respond_with_result_with(request, result, AckCallbacks::none())
    }

    pub fn respond_with_result_with(
        &self,
        request: &WcRequest,
        result: Value,
        callbacks: AckCallbacks,
    ) -> JoinHandle<()> {
        self.dispatcher.respond_with_result(request, result, callbacks)
    }

    /// Respond with `result: true`.
    pub fn respond_with_success(&self, request: &WcRequest) -> JoinHandle<()> {
        self.respond_with_success_with(request, AckCallbacks::none())
    }

    pub fn respond_with_success_with(
        &self,
        request: &WcRequest,
        callbacks: AckCallbacks,
    ) -> JoinHandle<()> {
        self.dispatcher.respond_with_success(request, callbacks)
    }

    pub fn respond_with_error(&self, request: &WcRequest, error: &PeerError) -> JoinHandle<()> {
        self.respond_with_error_with(request, error, AckCallbacks::none())
    }

    pub fn respond_with_error_with(
        &self,
        request: &WcRequest,
        error: &PeerError,
        callbacks: AckCallbacks,
    ) -> JoinHandle<()> {
        self.dispatcher.respond_with_error(request, error, callbacks)
    }

    // ── Subscriptions ───────────────────────────────────────────────────────

    /// Subscribe to `topic`. Failures are reported to diagnostics and yield
    /// `None`; they are never returned to the caller as errors.
    pub async fn subscribe(&self, topic: &Topic) -> Option<SubscriptionId> {
        match self.transport.subscribe(topic).await {
            Ok(id) => {
                tracing::info!(topic = %topic, subscription = %id, "subscribed");
                Some(id)
            }
            Err(source) => {
                self.report(RelayError::Subscribe {
                    topic: topic.clone(),
                    source,
                });
                None
            }
        }
    }

    /// Cancel a subscription. Returns `false` if the relay rejected it.
    pub async fn unsubscribe(&self, topic: &Topic, subscription_id: &SubscriptionId) -> bool {
        match self.transport.unsubscribe(topic, subscription_id).await {
            Ok(()) => true,
            Err(e) => {
                self.diagnostics
                    .error(&format!("Unsubscribe from {topic} failed: {e}"));
                false
            }
        }
    }

    // ── Observables ─────────────────────────────────────────────────────────

    pub fn connection_health(&self) -> ConnectionHealth {
        self.health.health()
    }

    pub fn is_connection_open(&self) -> bool {
        self.health.is_open()
    }

    /// Number of connection state changes observed so far.
    pub fn connection_transitions(&self) -> u64 {
        self.health.transitions()
    }

    /// Subscribe to fatal connection failures from this point on.
    pub fn initialization_errors(&self) -> InitializationErrors {
        self.init_errors.subscribe()
    }

    /// Peer requests and correlated responses from subscribed topics.
    pub fn incoming(&self) -> impl Stream<Item = Inbound> + Send + 'static {
        self.router.clone().into_stream(self.transport.messages())
    }

    pub fn ledger(&self) -> &RequestLedger {
        &self.ledger
    }

    /// Stop tracking connection health. Publishing keeps working.
    pub fn shutdown(&self) {
        self.health.shutdown();
    }

    fn report(&self, err: RelayError) {
        self.diagnostics.error(&err.to_string());
    }
}

impl std::fmt::Debug for Relayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relayer")
            .field("connected", &self.is_connection_open())
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

