//! Slackagent Engine - the agent runtime.
//!
//! This crate provides:
//! - [`ModelClient`] and the Bedrock Converse implementation
//! - [`Agent`], the tool-calling loop run once per invocation
//! - [`Persona`] and [`AgentFactory`], which bind prompts and tool lists
//! - [`A2aClient`], used to delegate to other agents over HTTP

pub mod a2a_client;
pub mod agent;
pub mod client;
pub mod error;
pub mod personas;

pub use a2a_client::{A2aClient, AGENTCORE_SIGNING_SERVICE};
pub use agent::{Agent, AgentResponse, AgentSettings};
pub use client::{BedrockClient, BedrockSettings, ModelClient, ScriptedModel};
pub use error::{EngineError, Result};
pub use personas::{AgentFactory, Persona, ToolSettings};
