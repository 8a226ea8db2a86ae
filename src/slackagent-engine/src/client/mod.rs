//! Model clients.
//!
//! [`ModelClient`] is the seam between the agent loop and the model
//! provider. [`BedrockClient`] talks to the Bedrock Converse API;
//! [`ScriptedModel`] replays canned responses in tests.

mod bedrock;
mod scripted;
mod types;

use async_trait::async_trait;

pub use bedrock::{BedrockClient, BedrockSettings};
pub use scripted::ScriptedModel;
pub use types::{
    ContentBlock, Message, ModelRequest, ModelResponse, Role, StopReason, TokenUsage,
};

use crate::error::Result;

/// A chat model with tool calling.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Model identifier, for logs.
    fn model(&self) -> &str;

    /// Run one completion.
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse>;
}
