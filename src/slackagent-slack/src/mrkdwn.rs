//! Markdown to Slack mrkdwn conversion.
//!
//! Models answer in GitHub-flavoured Markdown; Slack messages use mrkdwn,
//! which differs for bold, strikethrough, links and has no headings.

use std::sync::LazyLock;

use regex::Regex;

/// Slack truncates very long messages; stay well below the hard limit.
pub const MAX_MESSAGE_CHARS: usize = 3900;

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*|__(.+?)__").expect("Invalid bold regex"));
static STRIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"~~(.+?)~~").expect("Invalid strikethrough regex"));
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").expect("Invalid link regex"));
static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}[ \t]+(.+?)[ \t#]*$").expect("Invalid heading regex"));
static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([ \t]*)[-*+][ \t]+").expect("Invalid bullet regex"));

/// Convert Markdown to mrkdwn. Fenced code blocks and inline code are
/// copied unchanged.
pub fn markdown_to_mrkdwn(md: &str) -> String {
    let mut out = Vec::new();
    let mut in_fence = false;

    for line in md.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            out.push(line.to_string());
            continue;
        }
        if in_fence {
            out.push(line.to_string());
            continue;
        }

        let line = if let Some(caps) = HEADING.captures(line) {
            format!("*{}*", convert_inline(&caps[1]).trim_matches('*'))
        } else {
            let line = BULLET.replace(line, "${1}• ");
            convert_inline(&line)
        };
        out.push(line);
    }

    out.join("\n")
}

/// Convert inline markup outside backtick spans.
fn convert_inline(line: &str) -> String {
    line.split('`')
        .enumerate()
        .map(|(i, segment)| {
            if i % 2 == 1 {
                return segment.to_string();
            }
            let s = BOLD.replace_all(segment, |caps: &regex::Captures<'_>| {
                let inner = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
                format!("*{inner}*")
            });
            let s = STRIKE.replace_all(&s, "~$1~");
            LINK.replace_all(&s, "<$2|$1>").into_owned()
        })
        .collect::<Vec<_>>()
        .join("`")
}

/// Split text into chunks of at most `max_chars` characters, preferring
/// line boundaries.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        let needed = if current.is_empty() { line_len } else { line_len + 1 };

        if current_len + needed > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > max_chars {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
