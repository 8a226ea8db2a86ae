//! Delivers reply text as a chat message or a Canvas.
//!
//! Short conversational replies go out as threaded messages (converted to
//! mrkdwn and split at Slack's length limit). Long or heavily structured
//! replies become a Canvas when Canvas delivery is enabled; the thread
//! then gets a short pointer message. Any Canvas failure falls back to the
//! message path.

use std::sync::Arc;

use tracing::{info, warn};

use slackagent_guard::{ReplySurface, analyze};
use slackagent_slack::mrkdwn::MAX_MESSAGE_CHARS;
use slackagent_slack::{SlackApi, SlackResult, markdown_to_mrkdwn, split_message};

const MAX_TITLE_CHARS: usize = 80;
const DEFAULT_CANVAS_TITLE: &str = "Reply";

/// How a reply ended up being delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Posted as `parts` chat messages.
    Message { parts: usize },
    /// Written to a Canvas and announced in the thread.
    Canvas { canvas_id: String },
}

/// Where a reply should go.
pub struct ReplyTarget<'a> {
    pub token: &'a str,
    pub channel: &'a str,
    pub thread_ts: Option<&'a str>,
    pub correlation_id: &'a str,
}

#[derive(Clone)]
pub struct ReplyRouter {
    slack: Arc<dyn SlackApi>,
    canvas_enabled: bool,
}

impl std::fmt::Debug for ReplyRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyRouter")
            .field("canvas_enabled", &self.canvas_enabled)
            .finish_non_exhaustive()
    }
}

impl ReplyRouter {
    pub fn new(slack: Arc<dyn SlackApi>, canvas_enabled: bool) -> Self {
        Self {
            slack,
            canvas_enabled,
        }
    }

    /// Deliver `text`. Only the message path can fail.
    pub async fn deliver(&self, target: &ReplyTarget<'_>, text: &str) -> SlackResult<Delivery> {
        let report = analyze(text);
        let surface = if report.wants_rich_surface() {
            ReplySurface::Canvas
        } else {
            ReplySurface::Message
        };
        info!(
            correlation_id = target.correlation_id,
            channel = target.channel,
            chars = report.char_count,
            headings = report.headings,
            list_items = report.list_items,
            code_blocks = report.code_blocks,
            table_rows = report.table_rows,
            surface = %surface,
            canvas_enabled = self.canvas_enabled,
            "Routing reply"
        );

        if self.canvas_enabled && surface == ReplySurface::Canvas {
            match self.deliver_canvas(target, text).await {
                Ok(canvas_id) => return Ok(Delivery::Canvas { canvas_id }),
                Err(e) => {
                    warn!(
                        correlation_id = target.correlation_id,
                        error = %e,
                        "Canvas delivery failed, falling back to a message"
                    );
                }
            }
        }

        let parts = self.deliver_message(target, text).await?;
        Ok(Delivery::Message { parts })
    }

    async fn deliver_message(&self, target: &ReplyTarget<'_>, text: &str) -> SlackResult<usize> {
        let chunks = split_message(&markdown_to_mrkdwn(text), MAX_MESSAGE_CHARS);
        for chunk in &chunks {
            self.slack
                .post_message(target.token, target.channel, target.thread_ts, chunk)
                .await?;
        }
        Ok(chunks.len())
    }

    async fn deliver_canvas(&self, target: &ReplyTarget<'_>, text: &str) -> SlackResult<String> {
        let title = canvas_title(text);
        let canvas_id = self.slack.create_canvas(target.token, &title, text).await?;
        self.slack
            .share_canvas(target.token, &canvas_id, target.channel)
            .await?;

        let link = match self.slack.permalink(target.token, &canvas_id).await {
            Ok(link) => link,
            Err(e) => {
                warn!(correlation_id = target.correlation_id, error = %e, "Canvas permalink lookup failed");
                None
            }
        };
        let pointer = match link {
            Some(url) => format!("The full answer is in the canvas <{url}|{title}>."),
            None => format!("The full answer is in the canvas \"{title}\" shared with this channel."),
        };
        self.slack
            .post_message(target.token, target.channel, target.thread_ts, &pointer)
            .await?;
        Ok(canvas_id)
    }
}

/// First heading, else first non-empty line, trimmed of Markdown markers.
pub fn canvas_title(text: &str) -> String {
    let lines = || text.lines().map(str::trim).filter(|l| !l.is_empty());
    let line = lines()
        .find(|l| l.starts_with('#'))
        .or_else(|| lines().next())
        .unwrap_or(DEFAULT_CANVAS_TITLE);
    let title = line
        .trim_start_matches('#')
        .trim_start_matches(['-', '*', '+', '>'])
        .trim()
        .replace(['*', '`', '_'], "");

    if title.is_empty() {
        return DEFAULT_CANVAS_TITLE.to_string();
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        let cut: String = title.chars().take(MAX_TITLE_CHARS - 3).collect();
        return format!("{}...", cut.trim_end());
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use slackagent_slack::{RecordedCall, RecordingSlack};
    use std::sync::atomic::Ordering;

    const RICH: &str = "# Quarterly report\n\n## Sales\n\n- up 10%\n- new region\n\n## Costs\n\n```\ntotal: 42\n```\n";

    fn target() -> ReplyTarget<'static> {
        ReplyTarget {
            token: "xoxb-1",
            channel: "C1",
            thread_ts: Some("111.1"),
            correlation_id: "corr-1",
        }
    }

    #[tokio::test]
    async fn test_short_reply_is_message() {
        let slack = Arc::new(RecordingSlack::new());
        let router = ReplyRouter::new(slack.clone(), true);
        let delivery = router.deliver(&target(), "Hello **there**").await.unwrap();
        assert_eq!(delivery, Delivery::Message { parts: 1 });
        assert_eq!(slack.posted_texts(), vec!["Hello *there*"]);
    }

    #[tokio::test]
    async fn test_rich_reply_goes_to_canvas() {
        let slack = Arc::new(RecordingSlack::new());
        let router = ReplyRouter::new(slack.clone(), true);
        let delivery = router.deliver(&target(), RICH).await.unwrap();
        assert!(matches!(delivery, Delivery::Canvas { .. }));

        let calls = slack.calls();
        assert!(matches!(
            &calls[0],
            RecordedCall::CreateCanvas { title, .. } if title == "Quarterly report"
        ));
        assert!(calls.iter().any(|c| matches!(c, RecordedCall::ShareCanvas { channel, .. } if channel == "C1")));
        let posted = slack.posted_texts();
        assert_eq!(posted.len(), 1);
        assert!(posted[0].contains("canvas"));
    }

    #[tokio::test]
    async fn test_rich_reply_without_canvas_is_message() {
        let slack = Arc::new(RecordingSlack::new());
        let router = ReplyRouter::new(slack.clone(), false);
        let delivery = router.deliver(&target(), RICH).await.unwrap();
        assert_eq!(delivery, Delivery::Message { parts: 1 });
        assert!(!slack.calls().iter().any(|c| matches!(c, RecordedCall::CreateCanvas { .. })));
    }

    #[tokio::test]
    async fn test_canvas_failure_falls_back() {
        let slack = Arc::new(RecordingSlack::new());
        slack.fail_canvas.store(true, Ordering::SeqCst);
        let router = ReplyRouter::new(slack.clone(), true);
        let delivery = router.deliver(&target(), RICH).await.unwrap();
        assert_eq!(delivery, Delivery::Message { parts: 1 });
        assert!(slack.posted_texts()[0].contains("Quarterly report"));
    }

    #[tokio::test]
    async fn test_message_failure_propagates() {
        let slack = Arc::new(RecordingSlack::new());
        slack.fail_posts.store(true, Ordering::SeqCst);
        let router = ReplyRouter::new(slack, false);
        assert!(router.deliver(&target(), "hi").await.is_err());
    }

    #[test]
    fn test_canvas_title() {
        assert_eq!(canvas_title("intro\n# **Plan**\nbody"), "Plan");
        assert_eq!(canvas_title("- first item\n- second"), "first item");
        assert_eq!(canvas_title("   \n"), "Reply");
        let long = "x".repeat(200);
        assert_eq!(canvas_title(&long).chars().count(), MAX_TITLE_CHARS);
    }
}
