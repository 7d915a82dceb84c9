//! Relay server JSON-RPC framing.
//!
//! The relay speaks plain JSON-RPC 2.0 over the socket:
//! - `<prefix>_publish`     `{topic, message, ttl, prompt, tag}` → `true`
//! - `<prefix>_subscribe`   `{topic}` → subscription id
//! - `<prefix>_unsubscribe` `{topic, id}` → `true`
//! - `<prefix>_subscription` (server → client) `{id, data: {topic, message}}`,
//!   acknowledged with `result: true`

use serde_json::{json, Value};

use wcrelay_core::request::JSONRPC_VERSION;
use wcrelay_core::{JsonRpcError, PublishOptions, RelayMessage, SubscriptionId, Topic};

/// Builds relay requests for a given method prefix.
#[derive(Debug, Clone)]
pub struct RelayProtocol {
    prefix: String,
}

impl RelayProtocol {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    fn method(&self, name: &str) -> String {
        format!("{}_{name}", self.prefix)
    }

    fn request(&self, id: u64, name: &str, params: Value) -> Value {
        json!({
            "id": id,
            "jsonrpc": JSONRPC_VERSION,
            "method": self.method(name),
            "params": params,
        })
    }

    pub fn publish(&self, id: u64, topic: &Topic, message: &str, options: &PublishOptions) -> Value {
        self.request(
            id,
            "publish",
            json!({
                "topic": topic,
                "message": message,
                "ttl": options.ttl_secs,
                "prompt": options.prompt,
                "tag": options.tag,
            }),
        )
    }

    pub fn subscribe(&self, id: u64, topic: &Topic) -> Value {
        self.request(id, "subscribe", json!({ "topic": topic }))
    }

    pub fn unsubscribe(&self, id: u64, topic: &Topic, subscription_id: &SubscriptionId) -> Value {
        self.request(
            id,
            "unsubscribe",
            json!({ "topic": topic, "id": subscription_id }),
        )
    }

    /// Acknowledge a server-initiated request.
    pub fn ack(&self, id: u64) -> Value {
        json!({ "id": id, "jsonrpc": JSONRPC_VERSION, "result": true })
    }

    /// Classify a frame received from the relay.
    pub fn parse(&self, text: &str) -> Frame {
        let Ok(val) = serde_json::from_str::<Value>(text) else {
            return Frame::Unknown;
        };

        if let Some(method) = val.get("method").and_then(|m| m.as_str()) {
            if method != self.method("subscription") {
                return Frame::Unknown;
            }
            let Some(id) = val.get("id").and_then(|id| id.as_u64()) else {
                return Frame::Unknown;
            };
            let params = &val["params"];
            let (Some(sub), Some(topic), Some(message)) = (
                params["id"].as_str(),
                params["data"]["topic"].as_str(),
                params["data"]["message"].as_str(),
            ) else {
                return Frame::Unknown;
            };
            return Frame::Subscription {
                id,
                message: RelayMessage {
                    subscription_id: SubscriptionId(sub.to_string()),
                    topic: Topic::new(topic),
                    message: message.to_string(),
                },
            };
        }

        let Some(id) = val.get("id").and_then(|id| id.as_u64()) else {
            return Frame::Unknown;
        };
        if let Some(err) = val.get("error") {
            let error = serde_json::from_value::<JsonRpcError>(err.clone()).unwrap_or(JsonRpcError {
                code: -32603,
                message: err.to_string(),
            });
            return Frame::Response { id, result: Err(error) };
        }
        Frame::Response {
            id,
            result: Ok(val.get("result").cloned().unwrap_or(Value::Null)),
        }
    }
}

/// A decoded relay frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Reply to one of our requests.
    Response {
        id: u64,
        result: Result<Value, JsonRpcError>,
    },
    /// A message delivered on a subscribed topic.
    Subscription { id: u64, message: RelayMessage },
    Unknown,
}
