//! Slack Web API client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use slackagent_protocol::GeneratedFile;

use crate::error::{SlackApiError, SlackError, SlackResult};

/// Default Web API base URL.
pub const SLACK_API_BASE: &str = "https://slack.com/api";

/// A file to share in a conversation.
#[derive(Clone)]
pub struct FileUpload {
    pub channel: String,
    pub thread_ts: Option<String>,
    pub file_name: String,
    pub title: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub initial_comment: Option<String>,
}

impl std::fmt::Debug for FileUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileUpload")
            .field("channel", &self.channel)
            .field("thread_ts", &self.thread_ts)
            .field("file_name", &self.file_name)
            .field("title", &self.title)
            .field("mime_type", &self.mime_type)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

impl FileUpload {
    /// Share a generated file in a conversation, titled by its description.
    pub fn from_generated(
        file: GeneratedFile,
        channel: impl Into<String>,
        thread_ts: Option<String>,
    ) -> Self {
        let title = if file.description.trim().is_empty() {
            file.file_name.clone()
        } else {
            file.description.clone()
        };
        Self {
            channel: channel.into(),
            thread_ts,
            file_name: file.file_name,
            title,
            mime_type: file.mime_type,
            bytes: file.file_bytes,
            initial_comment: None,
        }
    }
}

/// One message of a thread, as returned by `conversations.replies`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub text: String,
    pub ts: String,
}

impl ThreadMessage {
    pub fn is_from_bot(&self) -> bool {
        self.bot_id.is_some()
    }
}

/// The Web API operations the agents use.
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// Post a message, returning its `ts`.
    async fn post_message(
        &self,
        token: &str,
        channel: &str,
        thread_ts: Option<&str>,
        text: &str,
    ) -> SlackResult<String>;

    /// Upload and share a file, returning its file id.
    async fn upload_file(&self, token: &str, upload: FileUpload) -> SlackResult<String>;

    /// Add a reaction. Already present reactions are not an error.
    async fn add_reaction(&self, token: &str, channel: &str, ts: &str, name: &str) -> SlackResult<()>;

    /// Remove a reaction. Absent reactions are not an error.
    async fn remove_reaction(&self, token: &str, channel: &str, ts: &str, name: &str)
    -> SlackResult<()>;

    /// Fetch up to `limit` messages of a thread, oldest first.
    async fn thread_messages(
        &self,
        token: &str,
        channel: &str,
        thread_ts: &str,
        limit: usize,
    ) -> SlackResult<Vec<ThreadMessage>>;

    /// Create a Canvas from Markdown, returning its id.
    async fn create_canvas(&self, token: &str, title: &str, markdown: &str) -> SlackResult<String>;

    /// Grant members of `channel` read access to a Canvas.
    async fn share_canvas(&self, token: &str, canvas_id: &str, channel: &str) -> SlackResult<()>;

    /// Permalink of a file (Canvases are files).
    async fn permalink(&self, token: &str, file_id: &str) -> SlackResult<Option<String>>;
}

/// Tunables for [`SlackClient`].
#[derive(Debug, Clone)]
pub struct SlackClientOptions {
    pub base_url: String,
    /// Timeout for regular API calls.
    pub api_timeout: Duration,
    /// Timeout for `conversations.replies`, which only enriches a prompt.
    pub history_timeout: Duration,
}

impl Default for SlackClientOptions {
    fn default() -> Self {
        Self {
            base_url: SLACK_API_BASE.to_string(),
            api_timeout: Duration::from_secs(30),
            history_timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP implementation of [`SlackApi`].
#[derive(Debug, Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    options: SlackClientOptions,
}

impl SlackClient {
    pub fn new(options: SlackClientOptions) -> SlackResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(options.api_timeout)
            .build()
            .map_err(|e| SlackError::Network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { http, options })
    }

    pub fn with_http(http: reqwest::Client, options: SlackClientOptions) -> Self {
        Self { http, options }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.options.base_url.trim_end_matches('/'))
    }

    /// POST a JSON body.
    async fn api_json(&self, token: &str, method: &str, payload: &Value) -> SlackResult<Value> {
        let response = self
            .http
            .post(self.url(method))
            .bearer_auth(token)
            .header("Content-Type", "application/json; charset=utf-8")
            .json(payload)
            .send()
            .await?;
        Self::check(method, response).await
    }

    /// POST form-encoded parameters (methods that do not accept JSON).
    async fn api_form(&self, token: &str, method: &str, params: &[(&str, String)]) -> SlackResult<Value> {
        let response = self
            .http
            .post(self.url(method))
            .bearer_auth(token)
            .form(params)
            .send()
            .await?;
        Self::check(method, response).await
    }

    async fn check(method: &str, response: reqwest::Response) -> SlackResult<Value> {
        if response.status() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(30);
            return Err(SlackError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SlackError::Api(format!("{method}: {status}: {body}")));
        }

        let body: Value = response.json().await?;
        if body.get("ok").and_then(Value::as_bool) != Some(true) {
            let code = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error");
            return Err(SlackApiError::new(method, code).into());
        }
        if let Some(warning) = body.get("warning").and_then(Value::as_str) {
            debug!(method, warning, "Slack API warning");
        }
        Ok(body)
    }

    fn string_field(method: &str, body: &Value, pointer: &str) -> SlackResult<String> {
        body.pointer(pointer)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| SlackError::InvalidPayload(format!("{method}: missing {pointer}")))
    }

    async fn reaction(&self, method: &str, token: &str, channel: &str, ts: &str, name: &str, benign: &str) -> SlackResult<()> {
        let payload = json!({"channel": channel, "timestamp": ts, "name": name});
        match self.api_json(token, method, &payload).await {
            Ok(_) => Ok(()),
            Err(SlackError::Api(message)) if message.ends_with(benign) => {
                debug!(method, name, "Reaction already in desired state");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl SlackApi for SlackClient {
    async fn post_message(
        &self,
        token: &str,
        channel: &str,
        thread_ts: Option<&str>,
        text: &str,
    ) -> SlackResult<String> {
        let mut payload = json!({
            "channel": channel,
            "text": text,
            "unfurl_links": false,
        });
        if let Some(thread_ts) = thread_ts {
            payload["thread_ts"] = json!(thread_ts);
        }
        let body = self.api_json(token, "chat.postMessage", &payload).await?;
        Self::string_field("chat.postMessage", &body, "/ts")
    }

    async fn upload_file(&self, token: &str, upload: FileUpload) -> SlackResult<String> {
        // 1. Reserve an upload URL.
        let body = self
            .api_form(
                token,
                "files.getUploadURLExternal",
                &[
                    ("filename", upload.file_name.clone()),
                    ("length", upload.bytes.len().to_string()),
                ],
            )
            .await?;
        let upload_url = Self::string_field("files.getUploadURLExternal", &body, "/upload_url")?;
        let file_id = Self::string_field("files.getUploadURLExternal", &body, "/file_id")?;

        // 2. Send the bytes.
        let part = reqwest::multipart::Part::bytes(upload.bytes)
            .file_name(upload.file_name.clone())
            .mime_str(&upload.mime_type)
            .map_err(|e| SlackError::Upload(format!("invalid mime type {}: {e}", upload.mime_type)))?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self
            .http
            .post(&upload_url)
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SlackError::Upload(format!(
                "upload of {} failed with status {}",
                upload.file_name,
                response.status()
            )));
        }

        // 3. Share it.
        let files = json!([{"id": file_id, "title": upload.title}]).to_string();
        let mut params = vec![("files", files), ("channel_id", upload.channel.clone())];
        if let Some(thread_ts) = upload.thread_ts {
            params.push(("thread_ts", thread_ts));
        }
        if let Some(comment) = upload.initial_comment {
            params.push(("initial_comment", comment));
        }
        self.api_form(token, "files.completeUploadExternal", &params)
            .await?;

        debug!(file_id = %file_id, channel = %upload.channel, "File shared");
        Ok(file_id)
    }

    async fn add_reaction(&self, token: &str, channel: &str, ts: &str, name: &str) -> SlackResult<()> {
        self.reaction("reactions.add", token, channel, ts, name, "already_reacted")
            .await
    }

    async fn remove_reaction(
        &self,
        token: &str,
        channel: &str,
        ts: &str,
        name: &str,
    ) -> SlackResult<()> {
        self.reaction("reactions.remove", token, channel, ts, name, "no_reaction")
            .await
    }

    async fn thread_messages(
        &self,
        token: &str,
        channel: &str,
        thread_ts: &str,
        limit: usize,
    ) -> SlackResult<Vec<ThreadMessage>> {
        let response = self
            .http
            .get(self.url("conversations.replies"))
            .bearer_auth(token)
            .query(&[
                ("channel", channel.to_string()),
                ("ts", thread_ts.to_string()),
                ("limit", limit.to_string()),
            ])
            .timeout(self.options.history_timeout)
            .send()
            .await?;
        let body = Self::check("conversations.replies", response).await?;

        let mut messages: Vec<ThreadMessage> = match body.get("messages") {
            Some(messages) => serde_json::from_value(messages.clone())?,
            None => Vec::new(),
        };
        if messages.len() > limit {
            warn!(count = messages.len(), limit, "Slack returned more messages than requested");
            messages.truncate(limit);
        }
        Ok(messages)
    }

    async fn create_canvas(&self, token: &str, title: &str, markdown: &str) -> SlackResult<String> {
        let payload = json!({
            "title": title,
            "document_content": {"type": "markdown", "markdown": markdown},
        });
        let body = self.api_json(token, "canvases.create", &payload).await?;
        Self::string_field("canvases.create", &body, "/canvas_id")
    }

    async fn share_canvas(&self, token: &str, canvas_id: &str, channel: &str) -> SlackResult<()> {
        let payload = json!({
            "canvas_id": canvas_id,
            "access_level": "read",
            "channel_ids": [channel],
        });
        self.api_json(token, "canvases.access.set", &payload).await?;
        Ok(())
    }

    async fn permalink(&self, token: &str, file_id: &str) -> SlackResult<Option<String>> {
        let body = self
            .api_form(token, "files.info", &[("file", file_id.to_string())])
            .await?;
        Ok(body
            .pointer("/file/permalink")
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> SlackClient {
        SlackClient::with_http(
            reqwest::Client::new(),
            SlackClientOptions {
                base_url: format!("{}/api", server.uri()),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_post_message_in_thread() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat.postMessage"))
            .and(header("authorization", "Bearer xoxb-1"))
            .and(body_partial_json(json!({"channel": "C1", "thread_ts": "1.0", "text": "hi"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "ts": "2.0"})))
            .expect(1)
            .mount(&server)
            .await;

        let ts = client_for(&server)
            .post_message("xoxb-1", "C1", Some("1.0"), "hi")
            .await
            .unwrap();
        assert_eq!(ts, "2.0");
    }

    #[tokio::test]
    async fn test_api_error_mapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat.postMessage"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": false, "error": "channel_not_found"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .post_message("xoxb-1", "C404", None, "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, SlackError::Channel(_)));
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .post_message("xoxb-1", "C1", None, "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, SlackError::RateLimited { retry_after_secs: 7 }));
    }

    #[tokio::test]
    async fn test_reaction_already_present_is_ok() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/reactions.add"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": false, "error": "already_reacted"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/reactions.remove"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": false, "error": "missing_scope"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.add_reaction("t", "C1", "1.0", "eyes").await.unwrap();
        assert!(client.remove_reaction("t", "C1", "1.0", "eyes").await.is_err());
    }

    #[tokio::test]
    async fn test_upload_file_flow() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/files.getUploadURLExternal"))
            .and(body_string_contains("filename=report.xlsx"))
            .and(body_string_contains("length=5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "upload_url": format!("{}/upload/abc", server.uri()),
                "file_id": "F123"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/upload/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("OK - 5"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/files.completeUploadExternal"))
            .and(body_string_contains("channel_id=C1"))
            .and(body_string_contains("thread_ts=1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "files": []})))
            .expect(1)
            .mount(&server)
            .await;

        let file_id = client_for(&server)
            .upload_file(
                "xoxb-1",
                FileUpload {
                    channel: "C1".to_string(),
                    thread_ts: Some("1.0".to_string()),
                    file_name: "report.xlsx".to_string(),
                    title: "Report".to_string(),
                    mime_type: "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
                        .to_string(),
                    bytes: b"hello".to_vec(),
                    initial_comment: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(file_id, "F123");
    }

    #[test]
    fn test_upload_from_generated_file() {
        let file = GeneratedFile::new(b"abc".to_vec(), "chart.png", "image/png", "");
        let upload = FileUpload::from_generated(file, "C1", Some("1.0".to_string()));
        assert_eq!(upload.title, "chart.png");
        assert_eq!(upload.bytes.len(), 3);
        assert!(format!("{upload:?}").contains("<3 bytes>"));
    }

    #[tokio::test]
    async fn test_thread_messages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/conversations.replies"))
            .and(query_param("channel", "C1"))
            .and(query_param("ts", "1.0"))
            .and(query_param("limit", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "messages": [
                    {"user": "U1", "text": "question", "ts": "1.0"},
                    {"bot_id": "B1", "text": "answer", "ts": "1.1"}
                ],
                "has_more": false
            })))
            .mount(&server)
            .await;

        let messages = client_for(&server)
            .thread_messages("t", "C1", "1.0", 20)
            .await
            .unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages[1].is_from_bot());
    }

    #[tokio::test]
    async fn test_canvas_create_and_permalink() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/canvases.create"))
            .and(body_partial_json(json!({"document_content": {"type": "markdown"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "canvas_id": "F9"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/files.info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "file": {"id": "F9", "permalink": "https://x.slack.com/docs/T1/F9"}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let id = client.create_canvas("t", "Answer", "# Hi").await.unwrap();
        assert_eq!(id, "F9");
        assert_eq!(
            client.permalink("t", &id).await.unwrap().as_deref(),
            Some("https://x.slack.com/docs/T1/F9")
        );
    }
}
