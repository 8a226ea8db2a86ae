//! Agent personas and the factory that assembles them.
//!
//! Each persona pairs a static system prompt with a fixed tool list. The
//! verification persona is the only one facing Slack; it reaches the
//! specialists through `delegate_to_*` tools.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use slackagent_protocol::{AgentCapabilities, AgentCard, AgentSkill};
use slackagent_tools::time::DEFAULT_TIMEZONE;
use slackagent_tools::{
    AgentInvoker, ChartImageTool, CurrentTimeTool, DelegateTool, ExcelTool, FetchUrlTool,
    PowerPointTool, SearchDocsTool, TextFileTool, ToolSet, WordTool,
};

use crate::agent::{Agent, AgentSettings};
use crate::client::ModelClient;
use crate::error::{EngineError, Result};

const VERIFICATION_PROMPT: &str = "\
You are the front desk of a Slack assistant. Users write to you in Slack.

Decide whether a specialist should handle the request:
- files (spreadsheets, documents, slides, charts, text files) and general tasks: delegate_to_execution
- the current date or time anywhere: delegate_to_time
- questions about the internal documentation: delegate_to_docs
- reading a web page the user linked: delegate_to_fetch_url

Pass each specialist a self-contained task with every detail it needs. When a
specialist attaches a file, tell the user the file is attached; never paste
its contents. Answer small talk and simple questions yourself.

Reply in the user's language. Be concise. Use Markdown headings, lists and
code blocks only when they help.";

const EXECUTION_PROMPT: &str = "\
You carry out tasks and produce files.

Use generate_excel for tables and spreadsheets, generate_word for documents,
generate_powerpoint for slide decks, generate_chart_image for bar charts and
generate_text_file for plain text, Markdown, CSV or JSON. Produce at most one
file per request. After a tool succeeds, summarise what the file contains in
one or two sentences. If a tool reports an error, fix the arguments and try
again once, then explain the problem.";

const TIME_PROMPT: &str = "\
You answer questions about the current date and time.

Always call get_current_time; never guess. The default time zone is Japan
Standard Time. Pass the time zone the user mentions (an IANA name, an
abbreviation such as PST, or an offset such as +05:30).";

const DOCS_PROMPT: &str = "\
You answer questions from the internal documentation.

Call search_docs with the key terms of the question, refine the query if the
first results do not help, and answer only from what you found. Name the
documents you used. If nothing relevant turns up, say so plainly.";

const FETCH_URL_PROMPT: &str = "\
You read web pages for the user.

Call fetch_url with the address from the task, then answer the question
about the page or summarise it. Quote sparingly. If the page cannot be
fetched, report the reason.";

/// The agents of the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Persona {
    Verification,
    Execution,
    Time,
    Docs,
    FetchUrl,
}

impl Persona {
    /// Every persona, verification first.
    pub fn all() -> [Persona; 5] {
        [
            Persona::Verification,
            Persona::Execution,
            Persona::Time,
            Persona::Docs,
            Persona::FetchUrl,
        ]
    }

    /// The specialists the verification agent may delegate to.
    pub fn specialists() -> [Persona; 4] {
        [
            Persona::Execution,
            Persona::Time,
            Persona::Docs,
            Persona::FetchUrl,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Persona::Verification => "verification",
            Persona::Execution => "execution",
            Persona::Time => "time",
            Persona::Docs => "docs",
            Persona::FetchUrl => "fetch-url",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Persona::Verification => {
                "Checks Slack requests and routes them to the right specialist agent"
            }
            Persona::Execution => {
                "Carries out tasks and generates Excel, Word, PowerPoint, chart and text files"
            }
            Persona::Time => "Tells the current date and time in any time zone",
            Persona::Docs => "Answers questions from the internal documentation",
            Persona::FetchUrl => "Fetches public web pages and summarises them",
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            Persona::Verification => VERIFICATION_PROMPT,
            Persona::Execution => EXECUTION_PROMPT,
            Persona::Time => TIME_PROMPT,
            Persona::Docs => DOCS_PROMPT,
            Persona::FetchUrl => FETCH_URL_PROMPT,
        }
    }

    /// Whether this persona's replies may carry a file.
    pub fn produces_files(&self) -> bool {
        matches!(self, Persona::Verification | Persona::Execution)
    }

    pub fn skills(&self) -> Vec<AgentSkill> {
        match self {
            Persona::Verification => vec![AgentSkill::new(
                "slack-assistant",
                "Slack assistant",
                "Answers Slack messages, delegating to specialist agents when needed",
            )
            .with_output_mode("file")],
            Persona::Execution => vec![
                AgentSkill::new(
                    "office-files",
                    "Office files",
                    "Creates Excel workbooks, Word documents and PowerPoint decks",
                )
                .with_output_mode("file"),
                AgentSkill::new("charts", "Charts", "Renders bar charts as PNG images")
                    .with_output_mode("file"),
                AgentSkill::new(
                    "text-files",
                    "Text files",
                    "Writes text, Markdown, CSV and JSON files",
                )
                .with_output_mode("file"),
            ],
            Persona::Time => vec![AgentSkill::new(
                "current-time",
                "Current time",
                "Reports the current date and time for a time zone",
            )],
            Persona::Docs => vec![AgentSkill::new(
                "search-docs",
                "Documentation search",
                "Searches the internal documentation",
            )],
            Persona::FetchUrl => vec![AgentSkill::new(
                "fetch-url",
                "Web page reader",
                "Fetches a public URL and returns its content as Markdown",
            )],
        }
    }

    /// The card served at `/.well-known/agent-card.json`.
    pub fn agent_card(&self, url: &str, version: &str) -> AgentCard {
        let mut card = AgentCard::new(self.as_str(), self.description(), url, version)
            .with_capabilities(AgentCapabilities {
                streaming: false,
                async_processing: *self == Persona::Verification,
                attachments: self.produces_files(),
            });
        if self.produces_files() {
            card = card.with_output_mode("file");
        }
        self.skills()
            .into_iter()
            .fold(card, |card, skill| card.with_skill(skill))
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Persona {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "verification" => Ok(Persona::Verification),
            "execution" => Ok(Persona::Execution),
            "time" => Ok(Persona::Time),
            "docs" => Ok(Persona::Docs),
            "fetch-url" | "fetchurl" => Ok(Persona::FetchUrl),
            other => Err(EngineError::UnknownAgent(other.to_string())),
        }
    }
}

/// Settings of the tools that read the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSettings {
    pub docs_path: PathBuf,
    pub default_timezone: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            docs_path: PathBuf::from("./docs"),
            default_timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

/// Builds agents sharing one model client.
#[derive(Clone)]
pub struct AgentFactory {
    model: Arc<dyn ModelClient>,
    settings: AgentSettings,
    tools: ToolSettings,
    invoker: Option<Arc<dyn AgentInvoker>>,
    specialists: Vec<Persona>,
}

impl fmt::Debug for AgentFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentFactory")
            .field("model", &self.model.model())
            .field("settings", &self.settings)
            .field("tools", &self.tools)
            .field("specialists", &self.specialists)
            .finish_non_exhaustive()
    }
}

impl AgentFactory {
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self {
            model,
            settings: AgentSettings::default(),
            tools: ToolSettings::default(),
            invoker: None,
            specialists: Vec::new(),
        }
    }

    pub fn with_settings(mut self, settings: AgentSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_tool_settings(mut self, tools: ToolSettings) -> Self {
        self.tools = tools;
        self
    }

    /// Enable delegation to `specialists` through `invoker`.
    pub fn with_delegation(
        mut self,
        invoker: Arc<dyn AgentInvoker>,
        specialists: impl IntoIterator<Item = Persona>,
    ) -> Self {
        self.invoker = Some(invoker);
        self.specialists = specialists
            .into_iter()
            .filter(|p| *p != Persona::Verification)
            .collect();
        self
    }

    /// Assemble the agent for `persona`.
    pub fn build(&self, persona: Persona) -> Result<Agent> {
        let tools = self.tools_for(persona)?;
        if tools.is_empty() {
            return Err(EngineError::Config(format!(
                "the {persona} agent has no tools; configure at least one specialist endpoint"
            )));
        }
        Ok(Agent::new(
            persona.as_str(),
            persona.system_prompt(),
            tools,
            Arc::clone(&self.model),
            self.settings,
        ))
    }

    fn tools_for(&self, persona: Persona) -> Result<ToolSet> {
        let tools = match persona {
            Persona::Execution => ToolSet::new()
                .with(ExcelTool::new())
                .with(WordTool::new())
                .with(PowerPointTool::new())
                .with(ChartImageTool::new())
                .with(TextFileTool::new()),
            Persona::Time => {
                ToolSet::new().with(CurrentTimeTool::new(self.tools.default_timezone.as_str()))
            }
            Persona::Docs => ToolSet::new().with(SearchDocsTool::new(&self.tools.docs_path)),
            Persona::FetchUrl => {
                let fetch = FetchUrlTool::new()
                    .map_err(|e| EngineError::Config(format!("fetch_url tool: {e}")))?;
                ToolSet::new().with(fetch)
            }
            Persona::Verification => {
                let mut tools = ToolSet::new();
                if let Some(invoker) = &self.invoker {
                    for specialist in &self.specialists {
                        tools.push(Arc::new(DelegateTool::new(
                            specialist.as_str(),
                            format!("Delegate to the {specialist} agent: {}", specialist.description()),
                            Arc::clone(invoker),
                        )));
                    }
                }
                tools
            }
        };
        Ok(tools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ModelResponse, ScriptedModel};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use slackagent_protocol::{ExecuteTaskParams, GeneratedFile, TaskResult};
    use slackagent_tools::ToolResult;

    struct EchoInvoker;

    #[async_trait]
    impl AgentInvoker for EchoInvoker {
        async fn invoke(&self, agent: &str, params: ExecuteTaskParams) -> ToolResult<TaskResult> {
            let file = GeneratedFile::new(b"x".to_vec(), "out.txt", "text/plain", "Output");
            Ok(TaskResult {
                agent: agent.to_string(),
                text: format!("{agent} did: {}", params.task_text().unwrap_or_default()),
                file_artifact: Some(file.to_artifact()),
                file_description: Some(file.description),
                tool_calls: 1,
            })
        }
    }

    fn factory(model: Arc<ScriptedModel>) -> AgentFactory {
        AgentFactory::new(model)
    }

    #[test]
    fn test_persona_names_round_trip() {
        for persona in Persona::all() {
            assert_eq!(persona.as_str().parse::<Persona>().unwrap(), persona);
        }
        assert_eq!("fetch_url".parse::<Persona>().unwrap(), Persona::FetchUrl);
        assert!("billing".parse::<Persona>().is_err());
    }

    #[test]
    fn test_tool_lists() {
        let factory = factory(Arc::new(ScriptedModel::default()));
        let names = |p| {
            factory
                .build(p)
                .unwrap()
                .tools()
                .names()
                .into_iter()
                .map(str::to_string)
                .collect::<Vec<_>>()
        };
        assert_eq!(
            names(Persona::Execution),
            vec![
                "generate_excel",
                "generate_word",
                "generate_powerpoint",
                "generate_chart_image",
                "generate_text_file"
            ]
        );
        assert_eq!(names(Persona::Time), vec!["get_current_time"]);
        assert_eq!(names(Persona::Docs), vec!["search_docs"]);
        assert_eq!(names(Persona::FetchUrl), vec!["fetch_url"]);
    }

    #[test]
    fn test_verification_needs_specialists() {
        let model = Arc::new(ScriptedModel::default());
        assert!(matches!(
            factory(model.clone()).build(Persona::Verification),
            Err(EngineError::Config(_))
        ));

        let agent = factory(model)
            .with_delegation(Arc::new(EchoInvoker), Persona::all())
            .build(Persona::Verification)
            .unwrap();
        assert_eq!(
            agent.tools().names(),
            vec![
                "delegate_to_execution",
                "delegate_to_time",
                "delegate_to_docs",
                "delegate_to_fetch_url"
            ]
        );
    }

    #[test]
    fn test_agent_card() {
        let card = Persona::Execution.agent_card("http://localhost:8080/", "0.1.0");
        assert_eq!(card.name, "execution");
        assert_eq!(card.protocol, "A2A");
        assert!(card.capabilities.attachments);
        assert_eq!(card.default_output_modes, vec!["text", "file"]);
        assert_eq!(card.skills.len(), 3);

        let card = Persona::Time.agent_card("http://localhost:8080/", "0.1.0");
        assert!(!card.capabilities.attachments);
        assert_eq!(card.default_output_modes, vec!["text"]);
    }

    #[tokio::test]
    async fn test_verification_adopts_delegated_file() {
        let model = Arc::new(ScriptedModel::new([
            ModelResponse::tool_use(
                "t1",
                "delegate_to_execution",
                json!({"task": "write a note"}),
            ),
            ModelResponse::text("Attached your note."),
        ]));
        let agent = factory(model)
            .with_delegation(Arc::new(EchoInvoker), [Persona::Execution])
            .build(Persona::Verification)
            .unwrap();

        let response = agent.run("please write a note", Some("corr-9")).await.unwrap();
        assert_eq!(response.text, "Attached your note.");
        assert_eq!(response.file.unwrap().file_name, "out.txt");
    }

    #[tokio::test]
    async fn test_docs_agent_reports_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new([
            ModelResponse::tool_use("t1", "search_docs", json!({"query": "deploy"})),
            ModelResponse::text("The docs are unavailable."),
        ]));
        let agent = factory(model.clone())
            .with_tool_settings(ToolSettings {
                docs_path: dir.path().join("missing"),
                ..ToolSettings::default()
            })
            .build(Persona::Docs)
            .unwrap();

        agent.run("how do I deploy?", None).await.unwrap();
        let requests = model.requests();
        let result = &requests[1].messages[2].content[0];
        assert!(matches!(
            result,
            crate::client::ContentBlock::ToolResult { is_error: true, .. }
        ));
    }
}
