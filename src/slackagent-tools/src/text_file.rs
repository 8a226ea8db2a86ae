//! Plain-text file generation.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use slackagent_protocol::GeneratedFile;

use crate::error::{ToolError, ToolResult, ensure_size};
use crate::file_name::{extension_of, sanitize_file_name};
use crate::spec::{Tool, ToolOutput, parse_args};
use crate::state::InvocationState;

const DEFAULT_EXTENSION: &str = "txt";

/// Supported extensions and their content types.
const TEXT_TYPES: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("tsv", "text/tab-separated-values"),
    ("json", "application/json"),
    ("html", "text/html"),
    ("xml", "application/xml"),
    ("yaml", "application/yaml"),
    ("yml", "application/yaml"),
    ("log", "text/plain"),
];

/// Content type for a supported text extension.
pub fn mime_for_extension(extension: &str) -> Option<&'static str> {
    TEXT_TYPES
        .iter()
        .find(|(ext, _)| ext.eq_ignore_ascii_case(extension))
        .map(|(_, mime)| *mime)
}

#[derive(Debug, Deserialize)]
struct TextFileArgs {
    #[serde(default)]
    file_name: String,
    #[serde(default)]
    content: String,
}

/// `generate_text_file`.
#[derive(Debug, Default)]
pub struct TextFileTool;

impl TextFileTool {
    pub fn new() -> Self {
        Self
    }

    fn run(&self, args: Value, state: &InvocationState) -> ToolResult<String> {
        let args: TextFileArgs = parse_args(args)?;
        if args.content.is_empty() {
            return Err(ToolError::InvalidArguments("content must not be empty".to_string()));
        }

        // Unknown extensions fall back to .txt rather than failing.
        let extension = extension_of(&args.file_name)
            .filter(|ext| mime_for_extension(ext).is_some())
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
        let mime_type = mime_for_extension(&extension).unwrap_or("text/plain");
        let file_name = sanitize_file_name(&args.file_name, &extension, "file");

        let bytes = args.content.into_bytes();
        ensure_size(bytes.len())?;

        let description = format!("{} file ({} bytes)", extension.to_ascii_uppercase(), bytes.len());
        state.store(GeneratedFile::new(bytes, &file_name, mime_type, &description));
        Ok(format!(
            "Created {file_name}: {description}. It will be attached to the reply."
        ))
    }
}

#[async_trait]
impl Tool for TextFileTool {
    fn name(&self) -> &str {
        crate::names::GENERATE_TEXT_FILE
    }

    fn description(&self) -> &str {
        "Create a text file (.txt, .md, .csv, .tsv, .json, .html, .xml, .yaml, .log) with the given content. The extension of file_name selects the type. The file is attached to the reply."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_name": {"type": "string", "description": "File name with extension, e.g. data.csv"},
                "content": {"type": "string"}
            },
            "required": ["file_name", "content"]
        })
    }

    async fn invoke(&self, args: Value, state: &InvocationState) -> ToolOutput {
        ToolOutput::from_result(self.run(args, state))
    }
}
