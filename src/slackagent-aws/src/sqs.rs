//! SQS queue access: the relay between the verification agent and the poster.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;

use crate::client::JsonProtocolClient;
use crate::error::{AwsError, AwsResult};
use crate::sigv4::SigV4Signer;

/// Longest long-poll SQS accepts.
pub const MAX_WAIT_SECONDS: u32 = 20;

/// Most messages one `ReceiveMessage` call may return.
pub const MAX_BATCH: u32 = 10;

/// A received message, deletable through its receipt handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueueMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
}

/// Producer side of a queue.
#[async_trait]
pub trait QueueSender: Send + Sync {
    /// Enqueue a message body, returning its message id.
    async fn send(&self, body: &str) -> AwsResult<String>;
}

/// Consumer side of a queue.
#[async_trait]
pub trait QueueReceiver: Send + Sync {
    /// Receive up to `max_messages`, long-polling for `wait_seconds`.
    async fn receive(&self, max_messages: u32, wait_seconds: u32) -> AwsResult<Vec<QueueMessage>>;

    /// Acknowledge a message so it is not redelivered.
    async fn delete(&self, receipt_handle: &str) -> AwsResult<()>;
}

/// SQS over the JSON protocol.
#[derive(Debug, Clone)]
pub struct SqsClient {
    client: JsonProtocolClient,
    queue_url: String,
}

impl SqsClient {
    /// Build a client for `queue_url`. Requests go to the queue URL's
    /// origin, which is the regional SQS endpoint for real queues.
    pub fn new(http: reqwest::Client, queue_url: impl Into<String>, signer: SigV4Signer) -> AwsResult<Self> {
        let queue_url = queue_url.into();
        let mut endpoint = Url::parse(&queue_url)
            .map_err(|e| AwsError::InvalidEndpoint(format!("{queue_url}: {e}")))?;
        endpoint.set_path("/");
        endpoint.set_query(None);

        Ok(Self {
            client: JsonProtocolClient::new(http, endpoint, signer.for_service("sqs"), "AmazonSQS"),
            queue_url,
        })
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SendMessageOutput {
    message_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiveMessageOutput {
    #[serde(default)]
    messages: Vec<QueueMessage>,
}

#[async_trait]
impl QueueSender for SqsClient {
    async fn send(&self, body: &str) -> AwsResult<String> {
        let output: SendMessageOutput = self
            .client
            .call(
                "SendMessage",
                &json!({"QueueUrl": self.queue_url, "MessageBody": body}),
                None,
            )
            .await?;
        tracing::debug!(message_id = %output.message_id, "Message enqueued");
        Ok(output.message_id)
    }
}

#[async_trait]
impl QueueReceiver for SqsClient {
    async fn receive(&self, max_messages: u32, wait_seconds: u32) -> AwsResult<Vec<QueueMessage>> {
        let wait_seconds = wait_seconds.min(MAX_WAIT_SECONDS);
        let output: ReceiveMessageOutput = self
            .client
            .call(
                "ReceiveMessage",
                &json!({
                    "QueueUrl": self.queue_url,
                    "MaxNumberOfMessages": max_messages.clamp(1, MAX_BATCH),
                    "WaitTimeSeconds": wait_seconds,
                }),
                Some(Duration::from_secs(u64::from(wait_seconds) + 10)),
            )
            .await?;
        Ok(output.messages)
    }

    async fn delete(&self, receipt_handle: &str) -> AwsResult<()> {
        let _: serde_json::Value = self
            .client
            .call(
                "DeleteMessage",
                &json!({"QueueUrl": self.queue_url, "ReceiptHandle": receipt_handle}),
                None,
            )
            .await?;
        Ok(())
    }
}

#[derive(Debug)]
struct StoredMessage {
    message: QueueMessage,
    in_flight: bool,
}

/// Process-local queue with SQS-like visibility semantics.
///
/// Received messages become invisible until deleted or released with
/// [`InMemoryQueue::release_in_flight`].
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    messages: Mutex<Vec<StoredMessage>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages not yet deleted.
    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Bodies of all messages not yet deleted, in arrival order.
    pub async fn bodies(&self) -> Vec<String> {
        self.messages
            .lock()
            .await
            .iter()
            .map(|m| m.message.body.clone())
            .collect()
    }

    /// Make received-but-undeleted messages visible again.
    pub async fn release_in_flight(&self) {
        for stored in self.messages.lock().await.iter_mut() {
            stored.in_flight = false;
        }
    }
}

#[async_trait]
impl QueueSender for InMemoryQueue {
    async fn send(&self, body: &str) -> AwsResult<String> {
        let message_id = uuid::Uuid::new_v4().to_string();
        self.messages.lock().await.push(StoredMessage {
            message: QueueMessage {
                message_id: message_id.clone(),
                receipt_handle: String::new(),
                body: body.to_string(),
            },
            in_flight: false,
        });
        Ok(message_id)
    }
}

#[async_trait]
impl QueueReceiver for InMemoryQueue {
    async fn receive(&self, max_messages: u32, _wait_seconds: u32) -> AwsResult<Vec<QueueMessage>> {
        let mut messages = self.messages.lock().await;
        let mut received = Vec::new();
        for stored in messages.iter_mut().filter(|m| !m.in_flight) {
            if received.len() >= max_messages.clamp(1, MAX_BATCH) as usize {
                break;
            }
            stored.in_flight = true;
            stored.message.receipt_handle = uuid::Uuid::new_v4().to_string();
            received.push(stored.message.clone());
        }
        Ok(received)
    }

    async fn delete(&self, receipt_handle: &str) -> AwsResult<()> {
        let mut messages = self.messages.lock().await;
        let before = messages.len();
        messages.retain(|m| m.message.receipt_handle != receipt_handle || receipt_handle.is_empty());
        if messages.len() == before {
            return Err(AwsError::Service {
                service: "sqs".to_string(),
                status: 400,
                code: "ReceiptHandleIsInvalid".to_string(),
                message: format!("unknown receipt handle {receipt_handle}"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::AwsCredentials;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sqs_for(server: &MockServer) -> SqsClient {
        SqsClient::new(
            reqwest::Client::new(),
            format!("{}/123456789012/slack-post", server.uri()),
            SigV4Signer::new(AwsCredentials::new("AKID", "secret", None), "us-east-1", "sqs"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_send_message() {
        let server = MockServer::start().await;
        let sqs = sqs_for(&server);
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("x-amz-target", "AmazonSQS.SendMessage"))
            .and(body_partial_json(serde_json::json!({
                "QueueUrl": sqs.queue_url(),
                "MessageBody": "{\"channel\":\"C1\"}"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "MessageId": "m-1",
                "MD5OfMessageBody": "x"
            })))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(sqs.send("{\"channel\":\"C1\"}").await.unwrap(), "m-1");
    }

    #[tokio::test]
    async fn test_receive_without_messages_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", "AmazonSQS.ReceiveMessage"))
            .and(body_partial_json(serde_json::json!({"WaitTimeSeconds": 20, "MaxNumberOfMessages": 10})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let messages = sqs_for(&server).receive(50, 60).await.unwrap();
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn test_receive_and_delete() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", "AmazonSQS.ReceiveMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Messages": [{"MessageId": "m-1", "ReceiptHandle": "rh-1", "Body": "hello", "MD5OfBody": "x"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", "AmazonSQS.DeleteMessage"))
            .and(body_partial_json(serde_json::json!({"ReceiptHandle": "rh-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let sqs = sqs_for(&server);
        let messages = sqs.receive(1, 0).await.unwrap();
        assert_eq!(messages[0].body, "hello");
        sqs.delete(&messages[0].receipt_handle).await.unwrap();
    }

    #[test]
    fn test_invalid_queue_url() {
        let result = SqsClient::new(
            reqwest::Client::new(),
            "not a url",
            SigV4Signer::new(AwsCredentials::new("a", "b", None), "us-east-1", "sqs"),
        );
        assert!(matches!(result, Err(AwsError::InvalidEndpoint(_))));
    }

    #[tokio::test]
    async fn test_in_memory_visibility() {
        let queue = InMemoryQueue::new();
        queue.send("one").await.unwrap();
        queue.send("two").await.unwrap();

        let first = queue.receive(1, 0).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].body, "one");

        // "one" is in flight, so the next receive only sees "two".
        let second = queue.receive(10, 0).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].body, "two");

        queue.delete(&second[0].receipt_handle).await.unwrap();
        queue.release_in_flight().await;
        let again = queue.receive(10, 0).await.unwrap();
        assert_eq!(again[0].body, "one");
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_in_memory_unknown_receipt() {
        let queue = InMemoryQueue::new();
        assert!(queue.delete("nope").await.is_err());
    }
}
