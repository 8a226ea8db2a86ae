//! Prompt sanitation for text arriving from Slack.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// `<@U123>` or `<@U123|name>` user mentions.
static USER_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@[A-Z0-9]+(?:\|[^>]*)?>").expect("Invalid mention regex"));

/// `<https://example.com|label>` or `<https://example.com>` links.
static LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(https?://[^|>\s]+)(?:\|[^>]*)?>").expect("Invalid link regex")
});

/// Three or more consecutive newlines.
static EXCESS_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("Invalid newline regex"));

/// Remove user mentions, leaving the rest of the text trimmed.
pub fn strip_mentions(text: &str) -> String {
    USER_MENTION.replace_all(text, "").trim().to_string()
}

/// Drop control characters other than newline and tab.
fn strip_control_chars(text: &str) -> Cow<'_, str> {
    if !text.chars().any(is_unwanted_control) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.chars().filter(|c| !is_unwanted_control(*c)).collect())
}

fn is_unwanted_control(c: char) -> bool {
    c.is_control() && c != '\n' && c != '\t'
}

/// Turn a raw Slack message into a prompt.
///
/// Strips mentions, unwraps links to their bare URL, unescapes the three
/// entities Slack escapes, removes control characters and collapses long
/// runs of blank lines. Carriage returns are normalized to newlines first.
pub fn sanitize_prompt(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n").replace('\r', "\n");
    let text = USER_MENTION.replace_all(&text, "");
    let text = LINK.replace_all(&text, "$1");
    let text = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");
    let text = strip_control_chars(&text);
    let text = EXCESS_NEWLINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}
