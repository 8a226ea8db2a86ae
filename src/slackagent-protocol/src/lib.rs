//! Slackagent Protocol - wire types shared by every process in the assistant.
//!
//! This crate provides:
//! - JSON-RPC 2.0 envelopes used by the A2A invocation endpoint
//! - The A2A agent card and health (`/ping`) payloads
//! - The generated-file record produced by tools and its base64 wire form
//! - The Slack post request relayed through the queue
//! - Invocation payloads exchanged between the ingress, the verification
//!   agent and the specialist agents

// ============================================================================
// Module declarations
// ============================================================================

mod agent_card;
mod artifact;
mod health;
mod invocation;
mod jsonrpc;
mod post_request;

/// A2A JSON-RPC method names.
pub mod methods;

// ============================================================================
// Re-exports
// ============================================================================

pub use agent_card::{
    A2A_PROTOCOL, A2A_PROTOCOL_VERSION, AgentCapabilities, AgentCard, AgentSkill,
    Authentication,
};
pub use artifact::{ArtifactError, FileArtifact, GeneratedFile};
pub use health::{PingResponse, PingStatus};
pub use invocation::{ExecuteTaskParams, InvocationRequest, TaskResult, VerificationRequest};
pub use jsonrpc::{JSONRPC_VERSION, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};
pub use post_request::SlackPostRequest;
