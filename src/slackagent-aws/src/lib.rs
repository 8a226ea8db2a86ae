//! AWS plumbing for the Slack agents.
//!
//! Only the handful of operations the system needs are implemented, each as
//! a signed JSON-protocol call over `reqwest`:
//!
//! - SQS `SendMessage` / `ReceiveMessage` / `DeleteMessage` ([`SqsClient`])
//! - DynamoDB `GetItem` for workspace bot tokens ([`DynamoTokenStore`])
//! - Request signing for any other service, e.g. Bedrock ([`SigV4Signer`])
//!
//! Every transport sits behind a trait with an in-memory implementation so
//! callers can be tested without AWS.

mod client;
pub mod credentials;
pub mod dynamo;
pub mod error;
pub mod sigv4;
pub mod sqs;

pub use client::JsonProtocolClient;
pub use credentials::AwsCredentials;
pub use dynamo::{DynamoTokenStore, StaticTokenStore, TokenStore};
pub use error::{AwsError, AwsResult};
pub use sigv4::SigV4Signer;
pub use sqs::{InMemoryQueue, QueueMessage, QueueReceiver, QueueSender, SqsClient};

/// Region used when `AWS_REGION` is not set.
pub const DEFAULT_REGION: &str = "ap-northeast-1";
