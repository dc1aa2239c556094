//! Event model.
//!
//! Two kinds of events reach the dispatcher: chat messages posted on the
//! platform and webhooks delivered over HTTP. Both are immutable once built
//! and are shared between handlers behind an `Arc`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Untyped payload as received from the platform session.
pub type RawEvent = Value;

// =============================================================================
// ChannelType
// =============================================================================

/// Kind of channel a message was posted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChannelType {
    /// Public channel (`O`).
    #[default]
    Open,
    /// Private channel (`P`).
    Private,
    /// One-to-one conversation with the bot (`D`).
    Direct,
    /// Group conversation (`G`).
    Group,
}

impl ChannelType {
    /// Parses the single-letter code used by the platform.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "O" => Some(Self::Open),
            "P" => Some(Self::Private),
            "D" => Some(Self::Direct),
            "G" => Some(Self::Group),
            _ => None,
        }
    }

    /// Returns the platform code for this channel type.
    pub fn code(self) -> &'static str {
        match self {
            Self::Open => "O",
            Self::Private => "P",
            Self::Direct => "D",
            Self::Group => "G",
        }
    }
}

// =============================================================================
// MessageEvent
// =============================================================================

/// A chat message posted in a channel the bot can see.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    /// Identifier of the post.
    pub post_id: String,
    /// Identifier of the channel.
    pub channel_id: String,
    /// Human-readable channel name.
    pub channel_name: String,
    /// Kind of channel.
    pub channel_type: ChannelType,
    /// Message text.
    pub text: String,
    /// User id of the sender.
    pub sender_id: String,
    /// Username of the sender, without a leading `@`.
    pub sender_name: String,
    /// User ids mentioned in the message.
    pub mentions: Vec<String>,
    /// Root post of the thread, if this message is a reply.
    pub root_id: Option<String>,
    /// The payload this event was classified from.
    #[serde(default)]
    pub raw: Value,
}

impl MessageEvent {
    /// Creates a message in an open channel.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Sets the sender.
    pub fn with_sender(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.sender_id = id.into();
        self.sender_name = name.into();
        self
    }

    /// Sets the channel.
    pub fn with_channel(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        channel_type: ChannelType,
    ) -> Self {
        self.channel_id = id.into();
        self.channel_name = name.into();
        self.channel_type = channel_type;
        self
    }

    /// Adds a mentioned user id.
    pub fn with_mention(mut self, user_id: impl Into<String>) -> Self {
        self.mentions.push(user_id.into());
        self
    }

    /// Sets the post id.
    pub fn with_post_id(mut self, post_id: impl Into<String>) -> Self {
        self.post_id = post_id.into();
        self
    }

    /// Whether the message was sent in a direct conversation with the bot.
    pub fn is_direct_message(&self) -> bool {
        self.channel_type == ChannelType::Direct
    }

    /// Whether `user_id` is among the mentioned users.
    pub fn mentions_user(&self, user_id: &str) -> bool {
        self.mentions.iter().any(|m| m == user_id)
    }

    /// The post a reply should be threaded under.
    pub fn reply_id(&self) -> &str {
        match self.root_id.as_deref() {
            Some(root) if !root.is_empty() => root,
            _ => &self.post_id,
        }
    }
}

// =============================================================================
// WebhookEvent
// =============================================================================

/// A webhook delivered to the bot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Identifier matched against webhook registrations.
    pub webhook_id: String,
    /// Decoded request body.
    pub payload: Value,
}

impl WebhookEvent {
    pub fn new(webhook_id: impl Into<String>, payload: Value) -> Self {
        Self {
            webhook_id: webhook_id.into(),
            payload,
        }
    }

    /// Returns a top-level string field of the payload.
    pub fn text_field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

// =============================================================================
// Event
// =============================================================================

/// Discriminant of an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Message,
    Webhook,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Webhook => "webhook",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Message(MessageEvent),
    Webhook(WebhookEvent),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Message(_) => EventKind::Message,
            Self::Webhook(_) => EventKind::Webhook,
        }
    }
}

impl From<MessageEvent> for Event {
    fn from(event: MessageEvent) -> Self {
        Self::Message(event)
    }
}

impl From<WebhookEvent> for Event {
    fn from(event: WebhookEvent) -> Self {
        Self::Webhook(event)
    }
}
