//! Invocation payloads exchanged between ingress, verification and specialists.

use serde::{Deserialize, Serialize};

use crate::artifact::FileArtifact;

/// Body of `POST /invocations` for a specialist agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

/// Parameters of the `execute_task` JSON-RPC method.
///
/// Callers in the wild send either `task` or `prompt`; both are accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteTaskParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Extra context prepended to the task (e.g. thread history).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ExecuteTaskParams {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: Some(task.into()),
            ..Default::default()
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// The task text, with context prepended when present. `None` when no
    /// non-blank task was supplied.
    pub fn task_text(&self) -> Option<String> {
        let task = self
            .task
            .as_deref()
            .or(self.prompt.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())?;

        match self.context.as_deref().map(str::trim) {
            Some(ctx) if !ctx.is_empty() => Some(format!("{ctx}\n\n{task}")),
            _ => Some(task.to_string()),
        }
    }
}

/// Result of an agent invocation, returned by `execute_task` and `/invocations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub agent: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_artifact: Option<FileArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_description: Option<String>,
    #[serde(default)]
    pub tool_calls: usize,
}

/// Payload the ingress sends to the verification agent.
#[derive(Clone, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub prompt: String,
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub bot_token: String,
    pub correlation_id: String,
}

impl std::fmt::Debug for VerificationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationRequest")
            .field("prompt_len", &self.prompt.chars().count())
            .field("channel", &self.channel)
            .field("thread_ts", &self.thread_ts)
            .field("message_ts", &self.message_ts)
            .field("team_id", &self.team_id)
            .field("user_id", &self.user_id)
            .field("bot_token", &"[REDACTED]")
            .field("correlation_id", &self.correlation_id)
            .finish()
    }
}

impl VerificationRequest {
    /// Whether the triggering message is a reply inside an existing thread.
    pub fn is_thread_reply(&self) -> bool {
        match (&self.thread_ts, &self.message_ts) {
            (Some(thread), Some(message)) => thread != message,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_text_prefers_task_and_prepends_context() {
        let params = ExecuteTaskParams {
            task: Some("  summarize  ".to_string()),
            prompt: Some("ignored".to_string()),
            context: Some("history".to_string()),
            correlation_id: None,
        };
        assert_eq!(params.task_text().unwrap(), "history\n\nsummarize");
    }

    #[test]
    fn test_task_text_falls_back_to_prompt() {
        let params: ExecuteTaskParams = serde_json::from_str(r#"{"prompt":"hi"}"#).unwrap();
        assert_eq!(params.task_text().as_deref(), Some("hi"));
    }

    #[test]
    fn test_blank_task_is_none() {
        let params = ExecuteTaskParams::new("   ");
        assert!(params.task_text().is_none());
    }

    #[test]
    fn test_thread_reply_detection() {
        let mut request = VerificationRequest {
            prompt: "p".to_string(),
            channel: "C1".to_string(),
            thread_ts: Some("1.0".to_string()),
            message_ts: Some("1.0".to_string()),
            team_id: None,
            user_id: None,
            bot_token: "xoxb".to_string(),
            correlation_id: "c".to_string(),
        };
        assert!(!request.is_thread_reply());
        request.message_ts = Some("2.0".to_string());
        assert!(request.is_thread_reply());
    }
}
