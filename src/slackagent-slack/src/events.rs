//! Events API payloads.
//!
//! Slack posts one of two envelopes to the events endpoint:
//! - `url_verification` when the endpoint is registered (echo the challenge)
//! - `event_callback` wrapping an inner event
//!
//! Only `app_mention` and direct `message` events become work for the
//! agents; everything else is acknowledged and ignored.

use serde::{Deserialize, Serialize};

use crate::error::{SlackError, SlackResult};

/// Outer payload posted by the Events API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEnvelope {
    /// Endpoint registration handshake.
    UrlVerification { challenge: String },
    /// A subscribed event.
    EventCallback(EventCallback),
    /// Unknown envelope type (for forward compatibility).
    #[serde(other)]
    Unknown,
}

impl EventEnvelope {
    pub fn parse(body: &[u8]) -> SlackResult<Self> {
        serde_json::from_slice(body).map_err(|e| SlackError::InvalidPayload(e.to_string()))
    }
}

/// `event_callback` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventCallback {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_time: Option<u64>,
    pub event: SlackEvent,
}

/// Inner event types that we handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEvent {
    /// The bot was @mentioned in a channel.
    AppMention(AppMentionEvent),
    /// A message in a conversation the bot can see.
    Message(MessageEvent),
    /// Unknown event type (for forward compatibility).
    #[serde(other)]
    Unknown,
}

/// Event payload for app mentions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppMentionEvent {
    /// User who mentioned the bot.
    #[serde(default)]
    pub user: Option<String>,
    /// Text of the message (including the mention).
    #[serde(default)]
    pub text: String,
    pub channel: String,
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
}

/// Event payload for messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    pub channel: String,
    /// Channel type (im, channel, group, mpim).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_type: Option<String>,
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    /// Subtype of message (e.g., "bot_message", "message_changed").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
}

impl MessageEvent {
    pub fn is_direct_message(&self) -> bool {
        self.channel_type.as_deref() == Some("im") || self.channel.starts_with('D')
    }

    pub fn is_bot_message(&self) -> bool {
        self.bot_id.is_some() || self.subtype.as_deref() == Some("bot_message")
    }

    /// Edits, deletions, joins and other non-authored messages carry a subtype.
    pub fn has_subtype(&self) -> bool {
        self.subtype.is_some()
    }
}

/// A user message the agents should answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub team_id: Option<String>,
    pub user_id: Option<String>,
    pub channel: String,
    /// Raw text, mentions included.
    pub text: String,
    pub message_ts: String,
    /// Thread root; the message itself when it starts a new thread.
    pub thread_ts: String,
}

impl InboundMessage {
    pub fn is_thread_reply(&self) -> bool {
        self.thread_ts != self.message_ts
    }
}

impl EventCallback {
    /// Extract the message to answer, if this event is one.
    ///
    /// App mentions from users are always answered. Plain messages are
    /// answered only in direct-message conversations, and never when sent
    /// by a bot or carrying a subtype (edits, deletions, joins).
    pub fn inbound_message(&self) -> Option<InboundMessage> {
        let (user, text, channel, ts, thread_ts) = match &self.event {
            SlackEvent::AppMention(e) if e.bot_id.is_none() => {
                (&e.user, &e.text, &e.channel, &e.ts, &e.thread_ts)
            }
            SlackEvent::Message(e)
                if e.is_direct_message() && !e.is_bot_message() && !e.has_subtype() =>
            {
                (&e.user, &e.text, &e.channel, &e.ts, &e.thread_ts)
            }
            _ => return None,
        };

        Some(InboundMessage {
            team_id: self.team_id.clone(),
            user_id: user.clone(),
            channel: channel.clone(),
            text: text.clone(),
            message_ts: ts.clone(),
            thread_ts: thread_ts.clone().unwrap_or_else(|| ts.clone()),
        })
    }
}
