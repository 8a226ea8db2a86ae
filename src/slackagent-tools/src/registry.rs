//! The tool list bound to one agent.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::spec::{Tool, ToolCall, ToolDefinition, ToolOutput};
use crate::state::InvocationState;

/// Default limit for a single tool call.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(120);

/// An ordered, fixed set of tools.
#[derive(Clone)]
pub struct ToolSet {
    tools: Vec<Arc<dyn Tool>>,
    timeout: Duration,
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSet")
            .field("tools", &self.names())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for ToolSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolSet {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Add a tool. A tool with the same name replaces the earlier one.
    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.push(Arc::new(tool));
        self
    }

    pub fn push(&mut self, tool: Arc<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run one call. Unknown tools and timeouts become error output.
    pub async fn execute(&self, call: &ToolCall, state: &InvocationState) -> ToolOutput {
        let Some(tool) = self.get(&call.name) else {
            warn!(tool = %call.name, "Model requested an unknown tool");
            return ToolOutput::error(format!(
                "Unknown tool: {}. Available tools: {}",
                call.name,
                self.names().join(", ")
            ));
        };

        let start = Instant::now();
        let output =
            match tokio::time::timeout(self.timeout, tool.invoke(call.arguments.clone(), state))
                .await
            {
                Ok(output) => output,
                Err(_) => ToolOutput::error(format!(
                    "Tool {} timed out after {} seconds",
                    call.name,
                    self.timeout.as_secs()
                )),
            };

        debug!(
            tool = %call.name,
            call_id = %call.id,
            is_error = output.is_error,
            duration_ms = start.elapsed().as_millis() as u64,
            correlation_id = ?state.correlation_id(),
            "Tool finished"
        );
        output
    }
}
