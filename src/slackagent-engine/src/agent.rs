//! The tool-calling loop.
//!
//! One [`Agent::run`] is one invocation: the model is called with the
//! conversation so far; every tool call it requests is executed and the
//! results are fed back, until the model answers with text or the step
//! limit is reached. Files produced by tools are collected from the
//! invocation's [`InvocationState`].

use std::sync::Arc;

use tracing::{info, instrument, warn};

use slackagent_protocol::{GeneratedFile, TaskResult};
use slackagent_tools::{InvocationState, ToolSet};

use crate::client::{ContentBlock, Message, ModelClient, ModelRequest, Role, StopReason};
use crate::error::{EngineError, Result};

pub const DEFAULT_MAX_STEPS: usize = 8;
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Model parameters shared by every agent of a process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentSettings {
    pub max_steps: usize,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// The outcome of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentResponse {
    pub text: String,
    pub file: Option<GeneratedFile>,
    pub tool_calls: usize,
}

impl AgentResponse {
    /// Wire form for `execute_task` and `/invocations`.
    pub fn into_task_result(self, agent: impl Into<String>) -> TaskResult {
        TaskResult {
            agent: agent.into(),
            text: self.text,
            file_artifact: self.file.as_ref().map(GeneratedFile::to_artifact),
            file_description: self.file.map(|f| f.description),
            tool_calls: self.tool_calls,
        }
    }
}

/// A system prompt, a tool list and a model.
#[derive(Clone)]
pub struct Agent {
    name: String,
    system_prompt: String,
    tools: ToolSet,
    model: Arc<dyn ModelClient>,
    settings: AgentSettings,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("model", &self.model.model())
            .field("tools", &self.tools.names())
            .field("settings", &self.settings)
            .finish()
    }
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        tools: ToolSet,
        model: Arc<dyn ModelClient>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            tools,
            model,
            settings,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Run one invocation for `prompt`.
    #[instrument(skip(self, prompt), fields(agent = %self.name))]
    pub async fn run(&self, prompt: &str, correlation_id: Option<&str>) -> Result<AgentResponse> {
        let state = match correlation_id {
            Some(id) => InvocationState::with_correlation_id(id),
            None => InvocationState::new(),
        };
        let mut messages = vec![Message::user(prompt)];
        let mut tool_calls = 0;

        for step in 1..=self.settings.max_steps {
            let response = self
                .model
                .complete(ModelRequest {
                    system: self.system_prompt.clone(),
                    messages: messages.clone(),
                    tools: self.tools.definitions(),
                    max_tokens: self.settings.max_tokens,
                    temperature: self.settings.temperature,
                })
                .await?;

            let calls = response.message.tool_calls();
            messages.push(response.message.clone());

            if calls.is_empty() {
                if response.stop_reason == StopReason::MaxTokens {
                    warn!(step, "Model reply truncated at the token limit");
                }
                let text = response.message.text().trim().to_string();
                let file = state.take();
                if text.is_empty() && file.is_none() {
                    return Err(EngineError::EmptyResponse);
                }
                info!(step, tool_calls, has_file = file.is_some(), correlation_id, "Agent finished");
                return Ok(AgentResponse {
                    text,
                    file,
                    tool_calls,
                });
            }

            let mut results = Vec::with_capacity(calls.len());
            for call in &calls {
                tool_calls += 1;
                let output = self.tools.execute(call, &state).await;
                results.push(ContentBlock::ToolResult {
                    tool_use_id: call.id.clone(),
                    content: output.text,
                    is_error: output.is_error,
                });
            }
            messages.push(Message {
                role: Role::User,
                content: results,
            });
        }

        Err(EngineError::MaxStepsExceeded {
            steps: self.settings.max_steps,
        })
    }
}
