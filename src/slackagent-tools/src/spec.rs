//! Tool interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolResult;
use crate::state::InvocationState;

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique ID for this call.
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Tool definition for the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for parameters.
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// What a tool tells the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }

    /// Render a tool result, turning errors into their message.
    pub fn from_result(result: ToolResult<String>) -> Self {
        match result {
            Ok(text) => Self::success(text),
            Err(e) => Self::error(e.to_string()),
        }
    }
}

/// A callable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Description shown to the model.
    fn description(&self) -> &str;

    /// JSON schema of the arguments.
    fn parameters(&self) -> Value;

    /// Run the tool. Never panics; failures come back as error output.
    async fn invoke(&self, args: Value, state: &InvocationState) -> ToolOutput;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.parameters())
    }
}

/// Decode tool arguments, mapping failures to an invalid-arguments error.
pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> ToolResult<T> {
    // Models occasionally send `null` for a tool without required fields.
    let args = if args.is_null() { Value::Object(Default::default()) } else { args };
    Ok(serde_json::from_value(args)?)
}
