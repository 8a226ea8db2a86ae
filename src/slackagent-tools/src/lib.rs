//! Tools the agents can call.
//!
//! Every tool implements [`Tool`]: a name, a description and a JSON schema
//! for the model, and an `invoke` that always answers with text. Failures
//! are reported to the model as text too; a tool never panics and never
//! aborts the agent loop.
//!
//! Tools that produce a file (spreadsheets, documents, slides, charts,
//! text files) place it in the [`InvocationState`] of the current agent
//! invocation. At most one file survives per invocation.

pub mod chart;
pub mod delegate;
pub mod docs;
pub mod error;
pub mod fetch;
pub mod file_name;
pub mod office;
pub mod registry;
pub mod spec;
pub mod state;
pub mod text_file;
pub mod time;

pub use chart::ChartImageTool;
pub use delegate::{AgentInvoker, DelegateTool};
pub use docs::SearchDocsTool;
pub use error::{ToolError, ToolResult};
pub use fetch::FetchUrlTool;
pub use office::{ExcelTool, PowerPointTool, WordTool};
pub use registry::ToolSet;
pub use spec::{Tool, ToolCall, ToolDefinition, ToolOutput};
pub use state::InvocationState;
pub use text_file::TextFileTool;
pub use time::CurrentTimeTool;

/// Largest file a tool may produce.
pub const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;

/// Standard tool names.
pub mod names {
    pub const GENERATE_EXCEL: &str = "generate_excel";
    pub const GENERATE_WORD: &str = "generate_word";
    pub const GENERATE_POWERPOINT: &str = "generate_powerpoint";
    pub const GENERATE_CHART_IMAGE: &str = "generate_chart_image";
    pub const GENERATE_TEXT_FILE: &str = "generate_text_file";
    pub const GET_CURRENT_TIME: &str = "get_current_time";
    pub const SEARCH_DOCS: &str = "search_docs";
    pub const FETCH_URL: &str = "fetch_url";
    pub const DELEGATE_PREFIX: &str = "delegate_to_";
}
