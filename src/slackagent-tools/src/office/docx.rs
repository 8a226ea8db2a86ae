//! Word document generation.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use slackagent_protocol::GeneratedFile;

use super::{DOCX_MIME, Package, content_types, root_rels, xml_escape};
use crate::error::{ToolError, ToolResult};
use crate::file_name::sanitize_file_name;
use crate::spec::{Tool, ToolOutput, parse_args};
use crate::state::InvocationState;

const MAX_PARAGRAPHS: usize = 5_000;
const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

// Half-points.
const TITLE_SIZE: u32 = 40;
const H1_SIZE: u32 = 32;
const H2_SIZE: u32 = 28;
const H3_SIZE: u32 = 26;

#[derive(Debug, Deserialize)]
struct WordArgs {
    #[serde(default)]
    file_name: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    paragraphs: Vec<String>,
    /// Free text, split into paragraphs on line breaks.
    #[serde(default)]
    content: Option<String>,
}

impl WordArgs {
    fn all_paragraphs(&self) -> Vec<String> {
        let mut paragraphs = self.paragraphs.clone();
        if let Some(content) = &self.content {
            paragraphs.extend(content.lines().map(str::to_string));
        }
        paragraphs
    }
}

/// Build a `.docx`. Lines starting with `#`, `##` or `###` become headings
/// and `- ` / `* ` items become bullets.
pub fn build_document(title: Option<&str>, paragraphs: &[String]) -> ToolResult<Vec<u8>> {
    let title = title.map(str::trim).filter(|t| !t.is_empty());
    if title.is_none() && paragraphs.iter().all(|p| p.trim().is_empty()) {
        return Err(ToolError::InvalidArguments(
            "the document needs a title or at least one paragraph".to_string(),
        ));
    }
    if paragraphs.len() > MAX_PARAGRAPHS {
        return Err(ToolError::InvalidArguments(format!(
            "at most {MAX_PARAGRAPHS} paragraphs are supported, got {}",
            paragraphs.len()
        )));
    }

    let mut body = String::new();
    if let Some(title) = title {
        body.push_str(&paragraph(title, Some(TITLE_SIZE)));
    }
    for line in paragraphs {
        body.push_str(&render_line(line));
    }

    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{W_NS}"><w:body>{body}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="720" w:footer="720" w:gutter="0"/></w:sectPr></w:body></w:document>"#
    );

    let mut package = Package::new();
    package.add(
        "[Content_Types].xml",
        &content_types(&[(
            "/word/document.xml".to_string(),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml",
        )]),
    )?;
    package.add("_rels/.rels", &root_rels("word/document.xml"))?;
    package.add("word/document.xml", &document)?;
    package.finish()
}

fn render_line(line: &str) -> String {
    let trimmed = line.trim_end();
    if let Some(text) = trimmed.strip_prefix("### ") {
        paragraph(text, Some(H3_SIZE))
    } else if let Some(text) = trimmed.strip_prefix("## ") {
        paragraph(text, Some(H2_SIZE))
    } else if let Some(text) = trimmed.strip_prefix("# ") {
        paragraph(text, Some(H1_SIZE))
    } else if let Some(text) = trimmed
        .trim_start()
        .strip_prefix("- ")
        .or_else(|| trimmed.trim_start().strip_prefix("* "))
    {
        paragraph(&format!("• {text}"), None)
    } else {
        paragraph(trimmed, None)
    }
}

/// One paragraph; `heading_size` makes it a bold run of that size.
fn paragraph(text: &str, heading_size: Option<u32>) -> String {
    if text.is_empty() {
        return "<w:p/>".to_string();
    }
    let props = match heading_size {
        Some(size) => format!(r#"<w:rPr><w:b/><w:sz w:val="{size}"/></w:rPr>"#),
        None => String::new(),
    };
    format!(
        r#"<w:p><w:r>{props}<w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
        xml_escape(text)
    )
}

/// `generate_word`.
#[derive(Debug, Default)]
pub struct WordTool;

impl WordTool {
    pub fn new() -> Self {
        Self
    }

    fn run(&self, args: Value, state: &InvocationState) -> ToolResult<String> {
        let args: WordArgs = parse_args(args)?;
        let paragraphs = args.all_paragraphs();
        let bytes = build_document(args.title.as_deref(), &paragraphs)?;
        let file_name = sanitize_file_name(&args.file_name, "docx", "document");

        let description = match args.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(title) => format!("Word document \"{title}\" ({} paragraphs)", paragraphs.len()),
            None => format!("Word document ({} paragraphs)", paragraphs.len()),
        };
        state.store(GeneratedFile::new(bytes, &file_name, DOCX_MIME, &description));
        Ok(format!(
            "Created {file_name}: {description}. It will be attached to the reply."
        ))
    }
}

#[async_trait]
impl Tool for WordTool {
    fn name(&self) -> &str {
        crate::names::GENERATE_WORD
    }

    fn description(&self) -> &str {
        "Create a Word (.docx) document. Each paragraph is one line; start a line with '# ', '## ' or '### ' for headings and '- ' for bullets. The file is attached to the reply."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_name": {"type": "string", "description": "File name, e.g. minutes.docx"},
                "title": {"type": "string"},
                "paragraphs": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["file_name", "paragraphs"]
        })
    }

    async fn invoke(&self, args: Value, state: &InvocationState) -> ToolOutput {
        ToolOutput::from_result(self.run(args, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::office::test_support::{part_names, read_part};

    #[test]
    fn test_headings_and_bullets() {
        let paragraphs = vec![
            "# Overview".to_string(),
            "Plain <text>".to_string(),
            "- first".to_string(),
            "".to_string(),
            "### Detail".to_string(),
        ];
        let bytes = build_document(Some("Minutes"), &paragraphs).unwrap();
        assert!(part_names(&bytes).contains(&"word/document.xml".to_string()));

        let xml = read_part(&bytes, "word/document.xml");
        assert!(xml.contains(r#"<w:sz w:val="40"/></w:rPr><w:t xml:space="preserve">Minutes</w:t>"#));
        assert!(xml.contains(r#"<w:sz w:val="32"/></w:rPr><w:t xml:space="preserve">Overview</w:t>"#));
        assert!(xml.contains(r#"<w:sz w:val="26"/></w:rPr><w:t xml:space="preserve">Detail</w:t>"#));
        assert!(xml.contains("Plain &lt;text&gt;"));
        assert!(xml.contains("• first"));
        assert!(xml.contains("<w:p/>"));
    }

    #[test]
    fn test_empty_document_rejected() {
        assert!(build_document(None, &["  ".to_string()]).is_err());
        assert!(build_document(Some("Only a title"), &[]).is_ok());
    }

    #[tokio::test]
    async fn test_content_is_split_into_paragraphs() {
        let state = InvocationState::new();
        let output = WordTool::new()
            .invoke(
                json!({"file_name": "notes", "title": "Notes", "content": "line one\nline two"}),
                &state,
            )
            .await;
        assert!(!output.is_error, "{}", output.text);

        let file = state.take().unwrap();
        assert_eq!(file.file_name, "notes.docx");
        assert_eq!(file.mime_type, DOCX_MIME);
        let xml = read_part(&file.file_bytes, "word/document.xml");
        assert!(xml.contains("line one"));
        assert!(xml.contains("line two"));
    }
}
