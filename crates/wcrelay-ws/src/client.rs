//! WebSocket relay transport with auto-reconnect and re-subscription.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time;
use tokio_tungstenite::tungstenite::Message;

use wcrelay_core::request::payload_id;
use wcrelay_core::{
    PublishAck, PublishOptions, RelayMessage, RelayTransport, SubscriptionId, Topic,
    TransportError, TransportEvent,
};

use crate::config::WsRelayConfig;
use crate::protocol::{Frame, RelayProtocol};
use crate::subscriptions::SubscriptionManager;

type Reply = oneshot::Sender<Result<Value, TransportError>>;

/// Who is waiting on a relay reply.
enum Waiter {
    Caller(Reply),
    Resubscribe(Topic),
}

type PendingMap = HashMap<u64, Waiter>;

/// Command sent from callers to the background WS task.
enum WsCommand {
    Request { id: u64, body: Value, tx: Reply },
    Close,
}

/// WebSocket relay client.
///
/// A background task owns the socket, multiplexes relay requests over it,
/// and handles reconnect + re-subscribe. Connection lifecycle is reported on
/// [`events`](RelayTransport::events).
pub struct WsRelayTransport {
    config: WsRelayConfig,
    protocol: RelayProtocol,
    cmd_tx: mpsc::UnboundedSender<WsCommand>,
    cmd_rx: Mutex<Option<mpsc::UnboundedReceiver<WsCommand>>>,
    events: broadcast::Sender<TransportEvent>,
    messages: broadcast::Sender<RelayMessage>,
    subscriptions: SubscriptionManager,
}

impl WsRelayTransport {
    /// Create the transport without connecting. Wire up event consumers
    /// (e.g. a `Relayer`) first, then call [`start`](Self::start).
    pub fn new(config: WsRelayConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.channel_capacity);
        let (messages, _) = broadcast::channel(config.channel_capacity);
        let protocol = RelayProtocol::new(config.method_prefix.clone());
        Self {
            config,
            protocol,
            cmd_tx,
            cmd_rx: Mutex::new(Some(cmd_rx)),
            events,
            messages,
            subscriptions: SubscriptionManager::new(),
        }
    }

    /// Spawn the background connection task. Calling it again is a no-op.
    pub fn start(&self) {
        let Some(cmd_rx) = self.cmd_rx.lock().unwrap().take() else {
            return;
        };
        let task = WsTask {
            config: self.config.clone(),
            protocol: self.protocol.clone(),
            events: self.events.clone(),
            messages: self.messages.clone(),
            subscriptions: self.subscriptions.clone(),
            pending: PendingMap::new(),
        };
        tokio::spawn(task.run(cmd_rx));
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Topics currently subscribed.
    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    async fn request(&self, id: u64, body: Value) -> Result<Value, TransportError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(WsCommand::Request { id, body, tx })
            .map_err(|_| TransportError::Closed)?;
        rx.await.map_err(|_| TransportError::Closed)?
    }
}

impl Drop for WsRelayTransport {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(WsCommand::Close);
    }
}

#[async_trait]
impl RelayTransport for WsRelayTransport {
    async fn publish(
        &self,
        topic: &Topic,
        message: String,
        options: PublishOptions,
    ) -> Result<PublishAck, TransportError> {
        let id = payload_id();
        let body = self.protocol.publish(id, topic, &message, &options);
        match self.request(id, body).await? {
            Value::Bool(false) => Err(TransportError::Other(format!(
                "relay rejected publish on {topic}"
            ))),
            _ => Ok(PublishAck { relay_id: id }),
        }
    }

    async fn subscribe(&self, topic: &Topic) -> Result<SubscriptionId, TransportError> {
        let id = payload_id();
        let body = self.protocol.subscribe(id, topic);
        let Value::String(sub) = self.request(id, body).await? else {
            return Err(TransportError::Other(
                "subscribe result is not a subscription id".into(),
            ));
        };
        let sub_id = SubscriptionId(sub);
        self.subscriptions.register(topic.clone(), sub_id.clone());
        Ok(sub_id)
    }

    async fn unsubscribe(
        &self,
        topic: &Topic,
        subscription_id: &SubscriptionId,
    ) -> Result<(), TransportError> {
        let id = payload_id();
        let body = self.protocol.unsubscribe(id, topic, subscription_id);
        self.request(id, body).await?;
        self.subscriptions.remove(topic);
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    fn messages(&self) -> broadcast::Receiver<RelayMessage> {
        self.messages.subscribe()
    }
}

/// State owned by the background connection task.
struct WsTask {
    config: WsRelayConfig,
    protocol: RelayProtocol,
    events: broadcast::Sender<TransportEvent>,
    messages: broadcast::Sender<RelayMessage>,
    subscriptions: SubscriptionManager,
    pending: PendingMap,
}

impl WsTask {
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<WsCommand>) {
        let endpoint = self.config.endpoint();
        let mut backoff = self.config.reconnect_initial();

        loop {
            tracing::info!(url = %self.config.url, "connecting to relay");

            match tokio_tungstenite::connect_async(endpoint.as_str()).await {
                Err(e) => {
                    tracing::warn!(error = %e, "relay connect failed, retrying in {backoff:?}");
                    self.emit(TransportEvent::Failed(e.to_string()));
                }
                Ok((ws_stream, _)) => {
                    backoff = self.config.reconnect_initial(); // reset on success
                    self.emit(TransportEvent::Opened);
                    let (mut sink, mut stream) = ws_stream.split();

                    // Re-subscribe topics from before the disconnect
                    for topic in self.subscriptions.active_topics() {
                        let id = payload_id();
                        let req = self.protocol.subscribe(id, &topic);
                        if sink.send(Message::Text(req.to_string().into())).await.is_ok() {
                            self.pending.insert(id, Waiter::Resubscribe(topic));
                        }
                    }

                    // Main dispatch loop
                    let closed_by_caller = loop {
                        tokio::select! {
                            cmd = cmd_rx.recv() => {
                                match cmd {
                                    None | Some(WsCommand::Close) => break true,
                                    Some(WsCommand::Request { id, body, tx }) => {
                                        if let Err(e) = sink.send(Message::Text(body.to_string().into())).await {
                                            let _ = tx.send(Err(TransportError::WebSocket(e.to_string())));
                                            break false;
                                        }
                                        self.pending.insert(id, Waiter::Caller(tx));
                                    }
                                }
                            }
                            msg = stream.next() => {
                                match msg {
                                    None => break false,
                                    Some(Err(e)) => {
                                        tracing::warn!(error = %e, "relay receive error");
                                        self.emit(TransportEvent::Failed(e.to_string()));
                                        break false;
                                    }
                                    Some(Ok(Message::Text(text))) => {
                                        self.emit(TransportEvent::MessageReceived(text.to_string()));
                                        if let Some(reply) = self.handle_frame(text.as_str()) {
                                            if sink.send(Message::Text(reply.into())).await.is_err() {
                                                break false;
                                            }
                                        }
                                    }
                                    Some(Ok(Message::Close(_))) => {
                                        self.emit(TransportEvent::Closing);
                                        break false;
                                    }
                                    _ => {}
                                }
                            }
                        }
                    };

                    self.fail_pending();

                    if closed_by_caller {
                        self.emit(TransportEvent::Closing);
                        let _ = sink.send(Message::Close(None)).await;
                        self.emit(TransportEvent::Closed);
                        tracing::info!(url = %self.config.url, "relay connection closed");
                        return;
                    }

                    self.emit(TransportEvent::Closed);
                    tracing::warn!(url = %self.config.url, "relay disconnected, reconnecting in {backoff:?}");
                }
            }

            if !self.backoff(backoff, &mut cmd_rx).await {
                return;
            }
            backoff = (backoff * 2).min(self.config.reconnect_max());
        }
    }

    /// Sleep out the backoff while rejecting requests. Returns `false` if the
    /// caller closed the transport meanwhile.
    async fn backoff(
        &self,
        delay: std::time::Duration,
        cmd_rx: &mut mpsc::UnboundedReceiver<WsCommand>,
    ) -> bool {
        let sleep = time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                cmd = cmd_rx.recv() => match cmd {
                    None | Some(WsCommand::Close) => return false,
                    Some(WsCommand::Request { tx, .. }) => {
                        let _ = tx.send(Err(TransportError::NotConnected));
                    }
                },
            }
        }
    }

    /// Process one text frame; returns a reply to send back, if any.
    fn handle_frame(&mut self, text: &str) -> Option<String> {
        match self.protocol.parse(text) {
            Frame::Response { id, result } => {
                match self.pending.remove(&id) {
                    Some(Waiter::Caller(tx)) => {
                        let _ = tx.send(result.map_err(TransportError::Rpc));
                    }
                    Some(Waiter::Resubscribe(topic)) => match result {
                        Ok(Value::String(sub)) => {
                            tracing::debug!(topic = %topic, subscription = %sub, "re-subscribed");
                            self.subscriptions.register(topic, SubscriptionId(sub));
                        }
                        Ok(other) => {
                            tracing::warn!(topic = %topic, result = %other, "unexpected re-subscribe result");
                        }
                        Err(e) => {
                            tracing::warn!(topic = %topic, error = %e, "re-subscribe rejected");
                        }
                    },
                    None => tracing::debug!(id, "reply for unknown relay request"),
                }
                None
            }
            Frame::Subscription { id, message } => {
                tracing::debug!(topic = %message.topic, "relay message received");
                if self.messages.send(message).is_err() {
                    tracing::debug!("no relay message subscribers");
                }
                Some(self.protocol.ack(id).to_string())
            }
            Frame::Unknown => {
                tracing::debug!("ignoring unrecognised relay frame");
                None
            }
        }
    }

    fn fail_pending(&mut self) {
        for (_, waiter) in self.pending.drain() {
            if let Waiter::Caller(tx) = waiter {
                let _ = tx.send(Err(TransportError::WebSocket("connection lost".into())));
            }
        }
    }

    fn emit(&self, event: TransportEvent) {
        // No receivers is fine; nobody is watching yet.
        let _ = self.events.send(event);
    }
}
