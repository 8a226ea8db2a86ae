//! Delegation to specialist agents.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use slackagent_protocol::{ExecuteTaskParams, TaskResult};

use crate::error::{ToolError, ToolResult};
use crate::spec::{Tool, ToolOutput, parse_args};
use crate::state::InvocationState;

/// Calls another agent with a task.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(&self, agent: &str, params: ExecuteTaskParams) -> ToolResult<TaskResult>;
}

#[derive(Debug, Deserialize)]
struct DelegateArgs {
    #[serde(default)]
    task: String,
    #[serde(default)]
    context: Option<String>,
}

/// `delegate_to_<agent>`: forwards a task and adopts the file the
/// specialist produced, if any.
pub struct DelegateTool {
    agent: String,
    tool_name: String,
    description: String,
    invoker: Arc<dyn AgentInvoker>,
}

impl std::fmt::Debug for DelegateTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegateTool")
            .field("agent", &self.agent)
            .field("tool_name", &self.tool_name)
            .finish_non_exhaustive()
    }
}

impl DelegateTool {
    pub fn new(
        agent: impl Into<String>,
        description: impl Into<String>,
        invoker: Arc<dyn AgentInvoker>,
    ) -> Self {
        let agent = agent.into();
        Self {
            tool_name: format!("{}{}", crate::names::DELEGATE_PREFIX, agent.replace('-', "_")),
            agent,
            description: description.into(),
            invoker,
        }
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    async fn run(&self, args: Value, state: &InvocationState) -> ToolResult<String> {
        let args: DelegateArgs = parse_args(args)?;
        if args.task.trim().is_empty() {
            return Err(ToolError::InvalidArguments("task must not be empty".to_string()));
        }

        let mut params = ExecuteTaskParams::new(args.task.trim());
        params.context = args.context;
        if let Some(id) = state.correlation_id() {
            params = params.with_correlation_id(id);
        }

        info!(agent = %self.agent, correlation_id = ?state.correlation_id(), "Delegating task");
        let result = self.invoker.invoke(&self.agent, params).await?;

        let mut text = result.text.trim().to_string();
        if text.is_empty() {
            text = format!("The {} agent returned no text.", self.agent);
        }

        if let Some(artifact) = result.file_artifact {
            let description = result
                .file_description
                .unwrap_or_else(|| format!("File from the {} agent", self.agent));
            match artifact.into_generated_file(description) {
                Ok(file) => {
                    let name = file.file_name.clone();
                    state.store(file);
                    text.push_str(&format!("\n\n[File {name} will be attached to the reply.]"));
                }
                Err(e) => {
                    warn!(agent = %self.agent, error = %e, "Discarding unreadable file artifact");
                }
            }
        }
        Ok(text)
    }
}

#[async_trait]
impl Tool for DelegateTool {
    fn name(&self) -> &str {
        &self.tool_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task": {"type": "string", "description": "Self-contained task for the agent, including every detail it needs"},
                "context": {"type": "string", "description": "Optional background such as earlier thread messages"}
            },
            "required": ["task"]
        })
    }

    async fn invoke(&self, args: Value, state: &InvocationState) -> ToolOutput {
        ToolOutput::from_result(self.run(args, state).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use slackagent_protocol::GeneratedFile;

    #[derive(Default)]
    struct FakeInvoker {
        seen: Mutex<Vec<(String, ExecuteTaskParams)>>,
        reply: Mutex<Option<ToolResult<TaskResult>>>,
    }

    impl FakeInvoker {
        fn replying(result: ToolResult<TaskResult>) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::default(),
                reply: Mutex::new(Some(result)),
            })
        }
    }

    #[async_trait]
    impl AgentInvoker for FakeInvoker {
        async fn invoke(&self, agent: &str, params: ExecuteTaskParams) -> ToolResult<TaskResult> {
            self.seen.lock().unwrap().push((agent.to_string(), params));
            self.reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(ToolError::Unavailable("no reply".into())))
        }
    }

    fn result(text: &str, file: Option<GeneratedFile>) -> TaskResult {
        TaskResult {
            agent: "execution".into(),
            text: text.into(),
            file_artifact: file.as_ref().map(GeneratedFile::to_artifact),
            file_description: file.map(|f| f.description),
            tool_calls: 1,
        }
    }

    #[test]
    fn test_tool_name() {
        let tool = DelegateTool::new("fetch-url", "d", FakeInvoker::replying(Ok(result("", None))));
        assert_eq!(tool.name(), "delegate_to_fetch_url");
        assert_eq!(tool.agent(), "fetch-url");
    }

    #[tokio::test]
    async fn test_adopts_file_artifact() {
        let file = GeneratedFile::new(b"a,b".to_vec(), "data.csv", "text/csv", "CSV export");
        let invoker = FakeInvoker::replying(Ok(result("Here is the CSV.", Some(file.clone()))));
        let tool = DelegateTool::new("execution", "Run tasks", invoker.clone());

        let state = InvocationState::with_correlation_id("corr-1");
        let output = tool.invoke(json!({"task": "export csv"}), &state).await;
        assert!(!output.is_error, "{}", output.text);
        assert!(output.text.starts_with("Here is the CSV."));
        assert!(output.text.contains("data.csv"));
        assert_eq!(state.take(), Some(file));

        let seen = invoker.seen.lock().unwrap();
        assert_eq!(seen[0].0, "execution");
        assert_eq!(seen[0].1.task.as_deref(), Some("export csv"));
        assert_eq!(seen[0].1.correlation_id.as_deref(), Some("corr-1"));
    }

    #[tokio::test]
    async fn test_invoker_failure_is_error_output() {
        let invoker = FakeInvoker::replying(Err(ToolError::Unavailable("time agent down".into())));
        let tool = DelegateTool::new("time", "Time", invoker);
        let state = InvocationState::new();
        let output = tool.invoke(json!({"task": "what time"}), &state).await;
        assert!(output.is_error);
        assert_eq!(output.text, "Unavailable: time agent down");
        assert!(!state.has_file());
    }

    #[tokio::test]
    async fn test_empty_task_not_sent() {
        let invoker = FakeInvoker::replying(Ok(result("x", None)));
        let tool = DelegateTool::new("docs", "Docs", invoker.clone());
        let output = tool.invoke(json!({"task": " "}), &InvocationState::new()).await;
        assert!(output.is_error);
        assert!(invoker.seen.lock().unwrap().is_empty());
    }
}
