//! Slack post request relayed through the queue.

use serde::{Deserialize, Serialize};

use crate::artifact::FileArtifact;

/// A reply waiting to be delivered to Slack.
///
/// Created by the verification agent and consumed exactly once by the
/// poster. The bot token travels with the request because each workspace
/// has its own installation.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackPostRequest {
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub file_artifact: Option<FileArtifact>,
    pub bot_token: String,
    pub correlation_id: String,
}

impl std::fmt::Debug for SlackPostRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackPostRequest")
            .field("channel", &self.channel)
            .field("thread_ts", &self.thread_ts)
            .field("message_ts", &self.message_ts)
            .field("text_len", &self.text.as_ref().map(|t| t.len()))
            .field(
                "file_artifact",
                &self.file_artifact.as_ref().map(|a| &a.file_name),
            )
            .field("bot_token", &"[REDACTED]")
            .field("correlation_id", &self.correlation_id)
            .finish()
    }
}

impl SlackPostRequest {
    pub fn new(
        channel: impl Into<String>,
        bot_token: impl Into<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            thread_ts: None,
            message_ts: None,
            text: None,
            file_artifact: None,
            bot_token: bot_token.into(),
            correlation_id: correlation_id.into(),
        }
    }

    pub fn in_thread(mut self, thread_ts: impl Into<String>) -> Self {
        self.thread_ts = Some(thread_ts.into());
        self
    }

    /// Message whose status reactions should be swapped on delivery.
    pub fn for_message(mut self, message_ts: impl Into<String>) -> Self {
        self.message_ts = Some(message_ts.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_file(mut self, artifact: FileArtifact) -> Self {
        self.file_artifact = Some(artifact);
        self
    }

    /// Whether there is anything to deliver.
    pub fn has_content(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.trim().is_empty()) || self.file_artifact.is_some()
    }
}
