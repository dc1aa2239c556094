//! Event ingestion seams.
//!
//! The platform session yields untyped JSON frames through an [`EventStream`];
//! an [`EventClassifier`] turns each frame into a typed [`Event`]. Webhooks
//! arrive through a separate HTTP path and are decoded by a
//! [`WebhookClassifier`].
//!
//! The JSON classifiers in this module understand Mattermost-style frames:
//!
//! ```json
//! {
//!   "event": "posted",
//!   "data": {
//!     "channel_name": "town-square",
//!     "channel_type": "O",
//!     "sender_name": "@alice",
//!     "mentions": "[\"bot-user-id\"]",
//!     "post": "{\"id\":\"p1\",\"channel_id\":\"c1\",\"user_id\":\"u1\",\"message\":\"ping\"}"
//!   }
//! }
//! ```

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::error::ClassifyError;
use crate::event::{ChannelType, Event, MessageEvent, RawEvent, WebhookEvent};

// =============================================================================
// EventStream
// =============================================================================

/// Source of raw platform frames.
///
/// `next_event` must be cancel-safe: the ingestion loop polls it inside
/// `tokio::select!` alongside the shutdown signal.
#[async_trait]
pub trait EventStream: Send {
    /// Waits for the next frame. Returns `None` once the stream is closed.
    async fn next_event(&mut self) -> Option<RawEvent>;
}

#[async_trait]
impl EventStream for mpsc::Receiver<RawEvent> {
    async fn next_event(&mut self) -> Option<RawEvent> {
        self.recv().await
    }
}

#[async_trait]
impl EventStream for mpsc::UnboundedReceiver<RawEvent> {
    async fn next_event(&mut self) -> Option<RawEvent> {
        self.recv().await
    }
}

// =============================================================================
// EventClassifier
// =============================================================================

/// Result of classifying a raw frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    Message(MessageEvent),
    Webhook(WebhookEvent),
    /// A frame the dispatcher has no use for (status replies, typing, ...).
    Unrecognized,
}

impl Classified {
    /// Converts into an [`Event`], dropping unrecognized frames.
    pub fn into_event(self) -> Option<Event> {
        match self {
            Self::Message(m) => Some(Event::Message(m)),
            Self::Webhook(w) => Some(Event::Webhook(w)),
            Self::Unrecognized => None,
        }
    }
}

/// Turns raw platform frames into typed events.
pub trait EventClassifier: Send + Sync + 'static {
    fn classify(&self, raw: &RawEvent) -> Result<Classified, ClassifyError>;
}

/// Classifier for Mattermost-style websocket frames.
///
/// Only `posted` frames become messages; every other frame is
/// [`Classified::Unrecognized`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonClassifier;

impl JsonClassifier {
    pub fn new() -> Self {
        Self
    }

    fn message_from_frame(raw: &RawEvent) -> Result<MessageEvent, ClassifyError> {
        let data = raw
            .get("data")
            .and_then(Value::as_object)
            .ok_or_else(|| ClassifyError::malformed("message", "missing `data` object"))?;

        let post = decode_embedded(data.get("post"))
            .ok_or_else(|| ClassifyError::malformed("message", "missing `data.post`"))?;
        let post = post
            .as_object()
            .ok_or_else(|| ClassifyError::malformed("message", "`data.post` is not an object"))?;

        let channel_type = match str_field(data, "channel_type") {
            "" => ChannelType::default(),
            code => ChannelType::from_code(code).ok_or_else(|| {
                ClassifyError::malformed("message", format!("unknown channel type '{code}'"))
            })?,
        };

        let mentions = decode_embedded(data.get("mentions"))
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_owned))
            .collect();

        let root_id = match str_field(post, "root_id") {
            "" => None,
            root => Some(root.to_owned()),
        };

        Ok(MessageEvent {
            post_id: str_field(post, "id").to_owned(),
            channel_id: str_field(post, "channel_id").to_owned(),
            channel_name: str_field(data, "channel_name").to_owned(),
            channel_type,
            text: str_field(post, "message").to_owned(),
            sender_id: str_field(post, "user_id").to_owned(),
            sender_name: str_field(data, "sender_name")
                .trim_start_matches('@')
                .to_owned(),
            mentions,
            root_id,
            raw: raw.clone(),
        })
    }
}

impl EventClassifier for JsonClassifier {
    fn classify(&self, raw: &RawEvent) -> Result<Classified, ClassifyError> {
        match raw.get("event").and_then(Value::as_str) {
            Some("posted") => Self::message_from_frame(raw).map(Classified::Message),
            _ => Ok(Classified::Unrecognized),
        }
    }
}

/// Reads a field that may hold either a JSON value or a JSON-encoded string.
fn decode_embedded(value: Option<&Value>) -> Option<Value> {
    match value? {
        Value::String(s) => serde_json::from_str(s).ok(),
        Value::Null => None,
        other => Some(other.clone()),
    }
}

fn str_field<'a>(obj: &'a Map<String, Value>, key: &str) -> &'a str {
    obj.get(key).and_then(Value::as_str).unwrap_or_default()
}

// =============================================================================
// WebhookClassifier
// =============================================================================

/// Turns an HTTP webhook request into a [`WebhookEvent`].
pub trait WebhookClassifier: Send + Sync + 'static {
    fn classify(&self, path: &str, body: &[u8]) -> Result<WebhookEvent, ClassifyError>;
}

/// Keys webhooks by the last segment of the request path and decodes the body
/// as JSON. An empty body yields a `null` payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonWebhookClassifier;

impl WebhookClassifier for JsonWebhookClassifier {
    fn classify(&self, path: &str, body: &[u8]) -> Result<WebhookEvent, ClassifyError> {
        let webhook_id = path
            .split('/')
            .rev()
            .find(|segment| !segment.is_empty())
            .ok_or_else(|| ClassifyError::malformed("webhook", "empty request path"))?;

        let payload = if body.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(body)
                .map_err(|e| ClassifyError::malformed("webhook", e.to_string()))?
        };

        Ok(WebhookEvent::new(webhook_id, payload))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn posted_frame(post: Value) -> Value {
        json!({
            "event": "posted",
            "data": {
                "channel_name": "town-square",
                "channel_type": "O",
                "sender_name": "@alice",
                "mentions": "[\"bot-id\"]",
                "post": post,
            },
            "seq": 4,
        })
    }

    #[test]
    fn test_posted_frame_with_encoded_post() {
        let post = json!({
            "id": "p1",
            "channel_id": "c1",
            "user_id": "u1",
            "root_id": "",
            "message": "ping",
        });
        let frame = posted_frame(Value::String(post.to_string()));

        let Classified::Message(msg) = JsonClassifier.classify(&frame).unwrap() else {
            panic!("expected a message");
        };
        assert_eq!(msg.text, "ping");
        assert_eq!(msg.post_id, "p1");
        assert_eq!(msg.channel_id, "c1");
        assert_eq!(msg.sender_id, "u1");
        assert_eq!(msg.sender_name, "alice");
        assert_eq!(msg.mentions, vec!["bot-id".to_string()]);
        assert_eq!(msg.root_id, None);
        assert_eq!(msg.raw, frame);
    }

    #[test]
    fn test_posted_frame_with_object_post() {
        let frame = json!({
            "event": "posted",
            "data": {
                "channel_type": "D",
                "mentions": ["bot-id"],
                "post": { "id": "p2", "message": "hi", "root_id": "p0" },
            },
        });

        let Classified::Message(msg) = JsonClassifier.classify(&frame).unwrap() else {
            panic!("expected a message");
        };
        assert!(msg.is_direct_message());
        assert_eq!(msg.reply_id(), "p0");
    }

    #[test]
    fn test_other_frames_are_unrecognized() {
        let typing = json!({ "event": "typing", "data": {} });
        let status = json!({ "status": "OK", "seq_reply": 1 });
        assert_eq!(JsonClassifier.classify(&typing).unwrap(), Classified::Unrecognized);
        assert_eq!(JsonClassifier.classify(&status).unwrap(), Classified::Unrecognized);
    }

    #[test]
    fn test_posted_without_post_is_malformed() {
        let frame = json!({ "event": "posted", "data": {} });
        let err = JsonClassifier.classify(&frame).unwrap_err();
        assert!(matches!(err, ClassifyError::Malformed { kind: "message", .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_webhook_classifier() {
        let event = JsonWebhookClassifier
            .classify("/hooks/hook1", br#"{"text": "deploy done"}"#)
            .unwrap();
        assert_eq!(event.webhook_id, "hook1");
        assert_eq!(event.text_field("text"), Some("deploy done"));

        let empty = JsonWebhookClassifier.classify("hook2/", b"").unwrap();
        assert_eq!(empty.webhook_id, "hook2");
        assert_eq!(empty.payload, Value::Null);

        assert!(JsonWebhookClassifier.classify("/", b"").is_err());
        assert!(JsonWebhookClassifier.classify("/hooks/x", b"not json").is_err());
    }

    #[test]
    fn test_channel_stream() {
        tokio_test::block_on(async {
            let (tx, mut rx) = mpsc::channel(4);
            tx.send(json!({ "event": "hello" })).await.unwrap();
            drop(tx);

            assert!(rx.next_event().await.is_some());
            assert!(rx.next_event().await.is_none());
        });
    }
}
