//! Relayer facade integration tests.
//!
//! A scripted in-memory transport acknowledges (or rejects) every publish
//! and lets the tests push connection events and relay messages.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use wcrelay_core::{
    AckCallbacks, ClientRequest, Delivery, Diagnostics, InMemoryHistory, Inbound,
    JsonRpcError, JsonRpcHistory, JsonRpcResponse, PeerError, PlainJsonSerializer, PublishAck,
    PublishOptions, RelayMessage, RelayTransport, Relayer, RelayerConfig, SubscriptionId, Topic,
    TransportError, TransportEvent, WcRequest,
};

// ─── Helpers ──────────────────────────────────────────────────────────────────

const DEFAULT_ID: u64 = 1_700_000_000_000_001;

struct MockTransport {
    events: broadcast::Sender<TransportEvent>,
    messages: broadcast::Sender<RelayMessage>,
    publish_ok: bool,
    subscribe_ok: bool,
    published: Mutex<Vec<(Topic, String, PublishOptions)>>,
}

impl MockTransport {
    fn new(publish_ok: bool, subscribe_ok: bool) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        let (messages, _) = broadcast::channel(64);
        Arc::new(Self {
            events,
            messages,
            publish_ok,
            subscribe_ok,
            published: Mutex::new(Vec::new()),
        })
    }

    fn published(&self) -> Vec<(Topic, String, PublishOptions)> {
        self.published.lock().unwrap().clone()
    }

    fn emit(&self, event: TransportEvent) {
        self.events.send(event).unwrap();
    }
}

#[async_trait]
impl RelayTransport for MockTransport {
    async fn publish(
        &self,
        topic: &Topic,
        message: String,
        options: PublishOptions,
    ) -> Result<PublishAck, TransportError> {
        self.published
            .lock()
            .unwrap()
            .push((topic.clone(), message, options));
        if self.publish_ok {
            Ok(PublishAck { relay_id: 1 })
        } else {
            Err(TransportError::WebSocket("mock publish failure".into()))
        }
    }

    async fn subscribe(&self, topic: &Topic) -> Result<SubscriptionId, TransportError> {
        if self.subscribe_ok {
            Ok(SubscriptionId(format!("sub-{topic}")))
        } else {
            Err(TransportError::WebSocket("mock subscribe failure".into()))
        }
    }

    async fn unsubscribe(
        &self,
        _topic: &Topic,
        _subscription_id: &SubscriptionId,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    fn messages(&self) -> broadcast::Receiver<RelayMessage> {
        self.messages.subscribe()
    }
}

#[derive(Default)]
struct RecordingDiagnostics {
    logs: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl Diagnostics for RecordingDiagnostics {
    fn log(&self, message: &str) {
        self.logs.lock().unwrap().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

#[derive(Clone, Default)]
struct Calls {
    success: Arc<AtomicUsize>,
    failure: Arc<AtomicUsize>,
}

impl Calls {
    fn callbacks(&self) -> AckCallbacks {
        let success = Arc::clone(&self.success);
        let failure = Arc::clone(&self.failure);
        AckCallbacks::new(
            move || {
                success.fetch_add(1, Ordering::SeqCst);
            },
            move |_| {
                failure.fetch_add(1, Ordering::SeqCst);
            },
        )
    }

    fn success(&self) -> usize {
        self.success.load(Ordering::SeqCst)
    }

    fn failure(&self) -> usize {
        self.failure.load(Ordering::SeqCst)
    }
}

struct Fixture {
    transport: Arc<MockTransport>,
    history: Arc<InMemoryHistory>,
    diagnostics: Arc<RecordingDiagnostics>,
    relayer: Relayer,
}

fn fixture(publish_ok: bool, subscribe_ok: bool) -> Fixture {
    let transport = MockTransport::new(publish_ok, subscribe_ok);
    let history = Arc::new(InMemoryHistory::new());
    let diagnostics = Arc::new(RecordingDiagnostics::default());
    let relayer = Relayer::with_diagnostics(
        transport.clone(),
        Arc::new(PlainJsonSerializer),
        history.clone(),
        RelayerConfig::default(),
        diagnostics.clone(),
    );
    Fixture {
        transport,
        history,
        diagnostics,
        relayer,
    }
}

fn topic() -> Topic {
    Topic::new("mockTopic")
}

fn sequence() -> ClientRequest {
    ClientRequest::with_id(DEFAULT_ID, "wc_sessionPing", json!({}))
}

fn request() -> WcRequest {
    WcRequest {
        id: DEFAULT_ID,
        topic: topic(),
        method: "wc_sessionPropose".into(),
        params: Value::Null,
    }
}

fn published_response(transport: &MockTransport) -> (Topic, JsonRpcResponse) {
    let published = transport.published();
    assert_eq!(published.len(), 1, "expected exactly one publish");
    let (topic, message, _) = published.into_iter().next().unwrap();
    (topic, serde_json::from_str(&message).unwrap())
}

async fn eventually(cond: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !cond() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// ─── Request publishing ───────────────────────────────────────────────────────

#[tokio::test]
async fn on_success_called_when_request_acknowledged() {
    let f = fixture(true, true);
    let calls = Calls::default();

    let handle = f
        .relayer
        .publish_request(&topic(), &sequence(), calls.callbacks())
        .expect("new request must be admitted");
    handle.await.unwrap();

    assert_eq!(calls.success(), 1);
    assert_eq!(calls.failure(), 0);
}

#[tokio::test]
async fn on_failure_called_when_request_publish_fails() {
    let f = fixture(false, true);
    let calls = Calls::default();

    f.relayer
        .publish_request(&topic(), &sequence(), calls.callbacks())
        .unwrap()
        .await
        .unwrap();

    assert_eq!(calls.failure(), 1);
    assert_eq!(calls.success(), 0);
}

#[tokio::test]
async fn already_recorded_request_runs_no_callback() {
    let f = fixture(true, true);
    f.history
        .set_request(DEFAULT_ID, &topic(), "wc_sessionPing", "{}");
    let calls = Calls::default();

    let handle = f
        .relayer
        .publish_request(&topic(), &sequence(), calls.callbacks());

    assert!(handle.is_none());
    tokio::task::yield_now().await;
    assert_eq!(calls.success(), 0);
    assert_eq!(calls.failure(), 0);
    assert!(f.transport.published().is_empty());
    assert!(f.diagnostics.errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn second_publish_of_same_id_is_skipped() {
    let f = fixture(true, true);

    let first = f.relayer.send_request(&topic(), &sequence()).await.unwrap();
    let second = f.relayer.send_request(&topic(), &sequence()).await.unwrap();

    assert!(matches!(first, Delivery::Acknowledged(_)));
    assert_eq!(second, Delivery::Skipped);
    assert_eq!(f.transport.published().len(), 1);
}

#[tokio::test]
async fn request_is_recorded_in_history() {
    let f = fixture(true, true);
    f.relayer.send_request(&topic(), &sequence()).await.unwrap();

    let entry = f.history.get_request(DEFAULT_ID).unwrap();
    assert_eq!(entry.topic, topic());
    assert_eq!(entry.method, "wc_sessionPing");
    assert!(entry.response.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_publishes_of_same_id_admit_one() {
    let f = Arc::new(fixture(true, true));
    let calls = Calls::default();

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let f = Arc::clone(&f);
            let calls = calls.clone();
            tokio::spawn(async move {
                f.relayer
                    .publish_request(&topic(), &sequence(), calls.callbacks())
            })
        })
        .collect();

    let mut admitted = Vec::new();
    for task in tasks {
        if let Some(handle) = task.await.unwrap() {
            admitted.push(handle);
        }
    }
    assert_eq!(admitted.len(), 1);
    for handle in admitted {
        handle.await.unwrap();
    }

    assert_eq!(f.transport.published().len(), 1);
    assert_eq!(calls.success(), 1);
    assert_eq!(calls.failure(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn publish_request_from_plain_thread() {
    let f = fixture(true, true);
    let calls = Calls::default();

    let handle = std::thread::scope(|s| {
        s.spawn(|| {
            f.relayer
                .publish_request(&topic(), &sequence(), calls.callbacks())
        })
        .join()
        .unwrap()
    });
    handle
        .expect("new request must be admitted")
        .await
        .unwrap();

    assert_eq!(calls.success(), 1);
    assert_eq!(f.transport.published().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn respond_from_plain_thread() {
    let f = fixture(false, true);
    let calls = Calls::default();

    let handle = std::thread::scope(|s| {
        s.spawn(|| {
            f.relayer
                .respond_with_error_with(&request(), &PeerError::new(-1, "message"), calls.callbacks())
        })
        .join()
        .unwrap()
    });
    handle.await.unwrap();

    assert_eq!(calls.failure(), 1);
    assert_eq!(f.diagnostics.errors.lock().unwrap().len(), 1);
}

// ─── Response publishing ──────────────────────────────────────────────────────

#[tokio::test]
async fn on_success_called_when_response_acknowledged() {
    let f = fixture(true, true);
    let calls = Calls::default();
    let response = JsonRpcResponse::result(DEFAULT_ID, Value::Bool(true));

    f.relayer
        .publish_response(&topic(), &response, calls.callbacks())
        .await
        .unwrap();

    assert_eq!(calls.success(), 1);
    assert_eq!(calls.failure(), 0);
}

#[tokio::test]
async fn on_failure_called_when_response_publish_fails() {
    let f = fixture(false, true);
    let calls = Calls::default();
    let response = JsonRpcResponse::result(DEFAULT_ID, Value::Bool(true));

    f.relayer
        .publish_response(&topic(), &response, calls.callbacks())
        .await
        .unwrap();

    assert_eq!(calls.failure(), 1);
    assert_eq!(calls.success(), 0);
}

#[tokio::test]
async fn responses_are_not_deduplicated() {
    let f = fixture(true, true);
    let response = JsonRpcResponse::result(DEFAULT_ID, Value::Bool(true));

    f.relayer.send_response(&topic(), &response).await.unwrap();
    f.relayer.send_response(&topic(), &response).await.unwrap();

    assert_eq!(f.transport.published().len(), 2);
    assert!(f.history.is_empty());
}

#[tokio::test]
async fn respond_with_result_publishes_params_on_request_topic() {
    let f = fixture(true, true);
    let params = json!({ "relay": { "protocol": "irn" }, "responderPublicKey": "abc" });

    f.relayer
        .respond_with_result(&request(), params.clone())
        .await
        .unwrap();

    let (published_topic, response) = published_response(&f.transport);
    assert_eq!(published_topic, topic());
    assert_eq!(response, JsonRpcResponse::result(DEFAULT_ID, params));
}

#[tokio::test]
async fn respond_with_success_publishes_true() {
    let f = fixture(true, true);

    f.relayer.respond_with_success(&request()).await.unwrap();

    let (published_topic, response) = published_response(&f.transport);
    assert_eq!(published_topic, topic());
    assert_eq!(response, JsonRpcResponse::result(DEFAULT_ID, Value::Bool(true)));
}

#[tokio::test]
async fn respond_with_error_publishes_peer_error() {
    let f = fixture(true, true);
    let peer_error = PeerError::new(-1, "message");

    f.relayer
        .respond_with_error(&request(), &peer_error)
        .await
        .unwrap();

    let (published_topic, response) = published_response(&f.transport);
    assert_eq!(published_topic, topic());
    assert_eq!(
        response,
        JsonRpcResponse::error(
            DEFAULT_ID,
            JsonRpcError {
                code: -1,
                message: "message".into()
            }
        )
    );
}

#[tokio::test]
async fn on_failure_called_when_respond_with_error_fails() {
    let f = fixture(false, true);
    let calls = Calls::default();

    f.relayer
        .respond_with_error_with(&request(), &PeerError::new(-1, "message"), calls.callbacks())
        .await
        .unwrap();

    assert_eq!(calls.failure(), 1);
    assert_eq!(calls.success(), 0);
}

#[tokio::test]
async fn unhandled_publish_failure_reaches_diagnostics() {
    let f = fixture(false, true);

    f.relayer
        .respond_with_error(&request(), &PeerError::new(-1, "message"))
        .await
        .unwrap();

    let errors = f.diagnostics.errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("mockTopic"), "got {errors:?}");
}

// ─── Subscriptions ────────────────────────────────────────────────────────────

#[tokio::test]
async fn subscribe_returns_relay_subscription_id() {
    let f = fixture(true, true);
    let id = f.relayer.subscribe(&topic()).await;
    assert_eq!(id, Some(SubscriptionId("sub-mockTopic".into())));
    assert!(f.diagnostics.errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn subscribe_failure_is_logged_not_raised() {
    let f = fixture(true, false);

    let id = f.relayer.subscribe(&topic()).await;

    assert!(id.is_none());
    let errors = f.diagnostics.errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Subscribe to mockTopic failed"));
}

// ─── Initialization errors ────────────────────────────────────────────────────

#[tokio::test]
async fn initialization_errors_emit_only_on_failed() {
    let f = fixture(true, true);
    let mut errors = f.relayer.initialization_errors();

    f.transport.emit(TransportEvent::Opened);
    f.transport.emit(TransportEvent::MessageReceived("{}".into()));
    f.transport.emit(TransportEvent::Closing);
    f.transport.emit(TransportEvent::Closed);
    f.transport.emit(TransportEvent::Failed("socket reset".into()));

    let failure = errors.recv().await.unwrap();
    assert_eq!(failure.cause, "socket reset");
    let next = tokio::time::timeout(Duration::from_millis(50), errors.recv()).await;
    assert!(next.is_err());
}

// ─── Connection health ────────────────────────────────────────────────────────

#[tokio::test]
async fn connection_initially_closed() {
    let f = fixture(true, true);
    assert!(!f.relayer.is_connection_open());
    assert!(!f.relayer.connection_health().is_open());
}

#[tokio::test]
async fn connection_opens_after_opened_event() {
    let f = fixture(true, true);
    let mut health = f.relayer.connection_health();

    f.transport.emit(TransportEvent::Opened);

    assert_eq!(health.changed().await, Some(true));
    assert!(f.relayer.is_connection_open());
    assert_eq!(f.relayer.connection_transitions(), 1);
}

#[tokio::test]
async fn repeated_opened_events_emit_once() {
    let f = fixture(true, true);

    f.transport.emit(TransportEvent::Opened);
    f.transport.emit(TransportEvent::Opened);
    f.transport.emit(TransportEvent::Opened);
    f.transport.emit(TransportEvent::Closed);

    // Opened counted once plus the Closed transition.
    eventually(|| !f.relayer.is_connection_open() && f.relayer.connection_transitions() >= 2).await;
    tokio::task::yield_now().await;
    assert_eq!(f.relayer.connection_transitions(), 2);
}

#[tokio::test]
async fn closed_after_open_ends_false() {
    let f = fixture(true, true);
    let mut health = f.relayer.connection_health();

    f.transport.emit(TransportEvent::Opened);
    assert_eq!(health.changed().await, Some(true));
    f.transport.emit(TransportEvent::Closed);
    assert_eq!(health.changed().await, Some(false));

    assert!(!f.relayer.is_connection_open());
    assert_eq!(f.relayer.connection_transitions(), 2);
}

#[tokio::test]
async fn failed_after_open_ends_false() {
    let f = fixture(true, true);

    f.transport.emit(TransportEvent::Opened);
    f.transport.emit(TransportEvent::Failed("timeout".into()));

    eventually(|| f.relayer.connection_transitions() == 2).await;
    assert!(!f.relayer.is_connection_open());
}

#[tokio::test]
async fn health_stream_never_repeats_a_value() {
    let f = fixture(true, true);
    let mut stream = Box::pin(f.relayer.connection_health().stream());
    assert_eq!(stream.next().await, Some(false));

    f.transport.emit(TransportEvent::Opened);
    f.transport.emit(TransportEvent::Closed);
    eventually(|| f.relayer.connection_transitions() == 2).await;
    f.transport.emit(TransportEvent::Opened);

    assert_eq!(stream.next().await, Some(true));
}

#[tokio::test]
async fn health_stream_starts_with_current_value() {
    let f = fixture(true, true);
    let mut stream = Box::pin(f.relayer.connection_health().stream());

    assert_eq!(stream.next().await, Some(false));
    f.transport.emit(TransportEvent::Opened);
    assert_eq!(stream.next().await, Some(true));
}

// ─── Inbound routing ──────────────────────────────────────────────────────────

#[tokio::test]
async fn inbound_response_correlates_with_published_request() {
    let f = fixture(true, true);
    let mut incoming = Box::pin(f.relayer.incoming());
    f.relayer.send_request(&topic(), &sequence()).await.unwrap();

    f.transport
        .messages
        .send(RelayMessage {
            subscription_id: SubscriptionId("sub-mockTopic".into()),
            topic: topic(),
            message: json!({ "id": DEFAULT_ID, "jsonrpc": "2.0", "result": true }).to_string(),
        })
        .unwrap();

    match incoming.next().await.unwrap() {
        Inbound::Response { entry, response } => {
            assert_eq!(entry.request_id, DEFAULT_ID);
            assert_eq!(entry.method, "wc_sessionPing");
            assert!(response.is_ok());
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(f.history.get_request(DEFAULT_ID).unwrap().response.is_some());
}

#[tokio::test]
async fn inbound_skips_unknown_response_and_yields_request() {
    let f = fixture(true, true);
    let mut incoming = Box::pin(f.relayer.incoming());
    let send = |message: Value| {
        f.transport
            .messages
            .send(RelayMessage {
                subscription_id: SubscriptionId("sub".into()),
                topic: topic(),
                message: message.to_string(),
            })
            .unwrap();
    };

    send(json!({ "id": 5, "jsonrpc": "2.0", "result": true }));
    send(json!({ "id": 6, "jsonrpc": "2.0", "method": "wc_sessionPing", "params": {} }));

    match incoming.next().await.unwrap() {
        Inbound::Request(req) => {
            assert_eq!(req.id, 6);
            assert_eq!(req.topic, topic());
        }
        other => panic!("unexpected {other:?}"),
    }
    let logs = f.diagnostics.logs.lock().unwrap();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].contains("5"));
}
