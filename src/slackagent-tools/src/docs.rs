//! Keyword search over a local documentation directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{ToolError, ToolResult};
use crate::spec::{Tool, ToolOutput, parse_args};
use crate::state::InvocationState;

pub const DEFAULT_MAX_RESULTS: usize = 5;
const MAX_RESULTS_LIMIT: usize = 10;
const MAX_DOC_BYTES: u64 = 1024 * 1024;
const SNIPPET_CHARS: usize = 300;
const DOC_EXTENSIONS: &[&str] = &["md", "markdown", "txt", "rst", "adoc"];

/// One ranked hit.
#[derive(Debug, Clone, PartialEq)]
pub struct DocMatch {
    /// Path relative to the docs root.
    pub path: String,
    pub score: usize,
    pub snippet: String,
}

/// Lowercased query terms, deduplicated, ignoring one-character noise.
fn terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for term in query
        .split(|c: char| !c.is_alphanumeric() && c != '_' && c != '-')
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() > 1 || t.chars().any(|c| !c.is_ascii()))
    {
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

/// Score a document: occurrences of each term, plus a bonus when the whole
/// query appears verbatim. Terms in the file name count double.
fn score(path: &str, content_lower: &str, terms: &[String], query_lower: &str) -> usize {
    let path_lower = path.to_lowercase();
    let mut total = 0;
    for term in terms {
        total += content_lower.matches(term.as_str()).count();
        total += 2 * path_lower.matches(term.as_str()).count();
    }
    if total > 0 && terms.len() > 1 && content_lower.contains(query_lower) {
        total += 10;
    }
    total
}

/// The line with the first term hit, widened to whole-word context and
/// capped at [`SNIPPET_CHARS`].
fn snippet(content: &str, terms: &[String]) -> String {
    let line = content
        .lines()
        .find(|line| {
            let lower = line.to_lowercase();
            terms.iter().any(|t| lower.contains(t.as_str()))
        })
        .or_else(|| content.lines().find(|l| !l.trim().is_empty()))
        .unwrap_or_default()
        .trim();

    if line.chars().count() <= SNIPPET_CHARS {
        return line.to_string();
    }
    let cut: String = line.chars().take(SNIPPET_CHARS).collect();
    format!("{cut}…")
}

fn is_doc(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| DOC_EXTENSIONS.iter().any(|d| d.eq_ignore_ascii_case(ext)))
}

/// Search `root` for `query`, best matches first.
pub fn search(root: &Path, query: &str, max_results: usize) -> ToolResult<Vec<DocMatch>> {
    if !root.is_dir() {
        return Err(ToolError::Unavailable(format!(
            "the documentation directory {} does not exist",
            root.display()
        )));
    }
    let terms = terms(query);
    if terms.is_empty() {
        return Err(ToolError::InvalidArguments(
            "query must contain at least one search term".to_string(),
        ));
    }
    let query_lower = query.trim().to_lowercase();

    let mut matches = Vec::new();
    for entry in walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.')
        })
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_doc(path) {
            continue;
        }
        match entry.metadata() {
            Ok(meta) if meta.len() <= MAX_DOC_BYTES => {}
            _ => {
                debug!(path = %path.display(), "Skipping oversized or unreadable document");
                continue;
            }
        }
        let Ok(content) = std::fs::read_to_string(path) else {
            continue;
        };

        let relative = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        let score = score(&relative, &content.to_lowercase(), &terms, &query_lower);
        if score > 0 {
            matches.push(DocMatch {
                snippet: snippet(&content, &terms),
                path: relative,
                score,
            });
        }
    }

    matches.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.path.cmp(&b.path)));
    matches.truncate(max_results.clamp(1, MAX_RESULTS_LIMIT));
    Ok(matches)
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    #[serde(default)]
    query: String,
    #[serde(default)]
    max_results: Option<usize>,
}

/// `search_docs`.
#[derive(Debug, Clone)]
pub struct SearchDocsTool {
    root: PathBuf,
}

impl SearchDocsTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn run(&self, args: Value) -> ToolResult<String> {
        let args: SearchArgs = parse_args(args)?;
        let query = args.query.trim().to_string();
        if query.is_empty() {
            return Err(ToolError::InvalidArguments("query must not be empty".to_string()));
        }
        let max_results = args.max_results.unwrap_or(DEFAULT_MAX_RESULTS);

        let root = self.root.clone();
        let search_query = query.clone();
        let matches = tokio::task::spawn_blocking(move || search(&root, &search_query, max_results))
            .await
            .map_err(|e| ToolError::Unavailable(format!("search task failed: {e}")))??;

        if matches.is_empty() {
            return Ok(format!("No documents matched \"{query}\"."));
        }
        let mut out = format!("Found {} document(s) for \"{query}\":\n", matches.len());
        for (i, m) in matches.iter().enumerate() {
            out.push_str(&format!("\n{}. {} (score {})\n   {}\n", i + 1, m.path, m.score, m.snippet));
        }
        Ok(out)
    }
}

#[async_trait]
impl Tool for SearchDocsTool {
    fn name(&self) -> &str {
        crate::names::SEARCH_DOCS
    }

    fn description(&self) -> &str {
        "Search the internal documentation by keywords and return the best matching files with a snippet each."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "max_results": {"type": "integer", "minimum": 1, "maximum": MAX_RESULTS_LIMIT}
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, args: Value, _state: &InvocationState) -> ToolOutput {
        ToolOutput::from_result(self.run(args).await)
    }
}
