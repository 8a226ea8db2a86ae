//! In-memory [`SlackApi`] that records every call.
//!
//! Lets the ingress, pipeline and poster be exercised without a workspace.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::api::{FileUpload, SlackApi, ThreadMessage};
use crate::error::{SlackError, SlackResult};

/// A call made against [`RecordingSlack`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    PostMessage {
        channel: String,
        thread_ts: Option<String>,
        text: String,
    },
    UploadFile {
        channel: String,
        thread_ts: Option<String>,
        file_name: String,
        mime_type: String,
        size: usize,
    },
    AddReaction {
        channel: String,
        ts: String,
        name: String,
    },
    RemoveReaction {
        channel: String,
        ts: String,
        name: String,
    },
    ThreadMessages {
        channel: String,
        thread_ts: String,
        limit: usize,
    },
    CreateCanvas {
        title: String,
        markdown: String,
    },
    ShareCanvas {
        canvas_id: String,
        channel: String,
    },
}

/// Recording fake with switchable failures.
#[derive(Debug, Default)]
pub struct RecordingSlack {
    calls: Mutex<Vec<RecordedCall>>,
    thread: Mutex<Vec<ThreadMessage>>,
    counter: AtomicUsize,
    pub fail_posts: AtomicBool,
    pub fail_uploads: AtomicBool,
    pub fail_reactions: AtomicBool,
    pub fail_history: AtomicBool,
    pub fail_canvas: AtomicBool,
}

impl RecordingSlack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages returned by `thread_messages`.
    pub fn with_thread(self, messages: Vec<ThreadMessage>) -> Self {
        *self.thread.lock().unwrap_or_else(|e| e.into_inner()) = messages;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Text of every posted message, in order.
    pub fn posted_texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RecordedCall::PostMessage { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: RecordedCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn fail_if(flag: &AtomicBool, what: &str) -> SlackResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(SlackError::Api(format!("{what}: simulated failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl SlackApi for RecordingSlack {
    async fn post_message(
        &self,
        _token: &str,
        channel: &str,
        thread_ts: Option<&str>,
        text: &str,
    ) -> SlackResult<String> {
        Self::fail_if(&self.fail_posts, "chat.postMessage")?;
        self.record(RecordedCall::PostMessage {
            channel: channel.to_string(),
            thread_ts: thread_ts.map(str::to_string),
            text: text.to_string(),
        });
        Ok(self.next_id("ts."))
    }

    async fn upload_file(&self, _token: &str, upload: FileUpload) -> SlackResult<String> {
        Self::fail_if(&self.fail_uploads, "files.completeUploadExternal")?;
        self.record(RecordedCall::UploadFile {
            channel: upload.channel,
            thread_ts: upload.thread_ts,
            file_name: upload.file_name,
            mime_type: upload.mime_type,
            size: upload.bytes.len(),
        });
        Ok(self.next_id("F"))
    }

    async fn add_reaction(&self, _token: &str, channel: &str, ts: &str, name: &str) -> SlackResult<()> {
        Self::fail_if(&self.fail_reactions, "reactions.add")?;
        self.record(RecordedCall::AddReaction {
            channel: channel.to_string(),
            ts: ts.to_string(),
            name: name.to_string(),
        });
        Ok(())
    }

    async fn remove_reaction(
        &self,
        _token: &str,
        channel: &str,
        ts: &str,
        name: &str,
    ) -> SlackResult<()> {
        Self::fail_if(&self.fail_reactions, "reactions.remove")?;
        self.record(RecordedCall::RemoveReaction {
            channel: channel.to_string(),
            ts: ts.to_string(),
            name: name.to_string(),
        });
        Ok(())
    }

    async fn thread_messages(
        &self,
        _token: &str,
        channel: &str,
        thread_ts: &str,
        limit: usize,
    ) -> SlackResult<Vec<ThreadMessage>> {
        self.record(RecordedCall::ThreadMessages {
            channel: channel.to_string(),
            thread_ts: thread_ts.to_string(),
            limit,
        });
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(SlackError::Timeout("conversations.replies".to_string()));
        }
        let thread = self.thread.lock().unwrap_or_else(|e| e.into_inner());
        Ok(thread.iter().take(limit).cloned().collect())
    }

    async fn create_canvas(&self, _token: &str, title: &str, markdown: &str) -> SlackResult<String> {
        Self::fail_if(&self.fail_canvas, "canvases.create")?;
        self.record(RecordedCall::CreateCanvas {
            title: title.to_string(),
            markdown: markdown.to_string(),
        });
        Ok(self.next_id("F"))
    }

    async fn share_canvas(&self, _token: &str, canvas_id: &str, channel: &str) -> SlackResult<()> {
        Self::fail_if(&self.fail_canvas, "canvases.access.set")?;
        self.record(RecordedCall::ShareCanvas {
            canvas_id: canvas_id.to_string(),
            channel: channel.to_string(),
        });
        Ok(())
    }

    async fn permalink(&self, _token: &str, file_id: &str) -> SlackResult<Option<String>> {
        Ok(Some(format!("https://example.slack.com/docs/T0/{file_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_calls_in_order() {
        let slack = RecordingSlack::new();
        slack.add_reaction("t", "C1", "1.0", "eyes").await.unwrap();
        slack.post_message("t", "C1", Some("1.0"), "hi").await.unwrap();

        let calls = slack.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[0], RecordedCall::AddReaction { ref name, .. } if name == "eyes"));
        assert_eq!(slack.posted_texts(), vec!["hi"]);
    }

    #[tokio::test]
    async fn test_failures_are_switchable() {
        let slack = RecordingSlack::new();
        slack.fail_posts.store(true, Ordering::SeqCst);
        assert!(slack.post_message("t", "C1", None, "hi").await.is_err());
        assert!(slack.calls().is_empty());
    }
}
