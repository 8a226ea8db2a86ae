//! Reply-surface classification.
//!
//! Long or heavily structured replies read poorly in a chat bubble. This
//! module inspects the Markdown shape of a reply and decides whether it
//! should be published on a Canvas instead of posted as a message.
//!
//! The decision is a pure function of the text: identical input always
//! yields the identical answer.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Replies longer than this (in characters) always get the rich surface.
pub const LONG_REPLY_THRESHOLD: usize = 800;

/// A line starting with one to six `#` followed by whitespace and content.
///
/// `[^\S\n]` is any Unicode whitespace except a line break, so full-width
/// spaces count and the match never runs onto the next line.
static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6}[^\S\n]+\S").expect("valid heading regex"));

/// A bulleted (`-`, `*`, `+`) or numbered (`1.`) list marker followed by
/// whitespace. The item itself may be empty.
static LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[^\S\n]*(?:[-*+]|\d+\.)[^\S\n]+").expect("valid list regex")
});

/// A fenced code block, possibly spanning lines.
static CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("valid code block regex"));

/// A pipe-delimited table row fragment on a single line.
static TABLE_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\|[^\n]+\|").expect("valid table regex"));

/// Where a reply should be published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySurface {
    /// A Slack Canvas linked from the thread.
    Canvas,
    /// A plain threaded message.
    Message,
}

impl std::fmt::Display for ReplySurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Canvas => write!(f, "canvas"),
            Self::Message => write!(f, "message"),
        }
    }
}

/// Counts of the Markdown features found in a reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattingReport {
    pub char_count: usize,
    pub headings: usize,
    pub list_items: usize,
    pub code_blocks: usize,
    pub table_rows: usize,
}

impl FormattingReport {
    /// Number of distinct element classes present (0 to 4).
    pub fn element_classes(&self) -> usize {
        [
            self.headings,
            self.list_items,
            self.code_blocks,
            self.table_rows,
        ]
        .iter()
        .filter(|count| **count > 0)
        .count()
    }

    /// Whether the report qualifies the reply for the rich surface.
    pub fn wants_rich_surface(&self) -> bool {
        if self.char_count > LONG_REPLY_THRESHOLD {
            return true;
        }
        if self.headings >= 2 {
            return true;
        }
        self.element_classes() >= 2
    }
}

/// Inspect a reply. Blank text yields an empty report.
pub fn analyze(text: &str) -> FormattingReport {
    if text.trim().is_empty() {
        return FormattingReport::default();
    }

    FormattingReport {
        char_count: text.chars().count(),
        headings: HEADING.find_iter(text).count(),
        list_items: LIST_ITEM.find_iter(text).count(),
        code_blocks: CODE_BLOCK.find_iter(text).count(),
        table_rows: TABLE_ROW.find_iter(text).count(),
    }
}

/// Whether a reply should be published on the rich surface.
///
/// True when the reply is longer than [`LONG_REPLY_THRESHOLD`] characters,
/// has at least two heading lines, or mixes at least two of headings, list
/// items, fenced code blocks and table rows. Blank text is always false.
pub fn use_rich_surface(text: &str) -> bool {
    analyze(text).wants_rich_surface()
}

/// Pick the surface for a reply.
pub fn route_reply(text: &str) -> ReplySurface {
    if use_rich_surface(text) {
        ReplySurface::Canvas
    } else {
        ReplySurface::Message
    }
}
