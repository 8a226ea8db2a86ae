//! The verification agent's request pipeline.
//!
//! `run` takes the Slack context the ingress forwarded, re-validates the
//! prompt, enriches it with earlier thread messages, runs the verification
//! agent and enqueues the reply for the poster. Thread context is best
//! effort; a queue failure is logged and returned to the caller.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use slackagent_aws::QueueSender;
use slackagent_engine::Agent;
use slackagent_guard::PromptValidator;
use slackagent_protocol::{SlackPostRequest, VerificationRequest};
use slackagent_slack::{SlackApi, ThreadMessage};

use crate::error::{AppError, AppResult};

/// Reply sent when the agent fails.
pub const FAILURE_REPLY: &str =
    "Sorry, something went wrong while handling your request. Please try again in a moment.";

const MAX_CONTEXT_MESSAGE_CHARS: usize = 500;

/// How the request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The agent answered.
    Answered,
    /// The prompt failed validation; the reason was sent instead.
    Rejected,
    /// The agent failed; an apology was sent instead.
    Failed,
}

/// Result of [`VerificationPipeline::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub status: OutcomeStatus,
    pub correlation_id: String,
    /// Queue message id of the enqueued post request.
    pub message_id: String,
    pub has_file: bool,
    pub tool_calls: usize,
}

#[derive(Clone)]
pub struct VerificationPipeline {
    agent: Agent,
    validator: PromptValidator,
    slack: Arc<dyn SlackApi>,
    queue: Arc<dyn QueueSender>,
    context_limit: usize,
    context_timeout: Duration,
}

impl std::fmt::Debug for VerificationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationPipeline")
            .field("agent", &self.agent.name())
            .field("validator", &self.validator)
            .field("context_limit", &self.context_limit)
            .field("context_timeout", &self.context_timeout)
            .finish_non_exhaustive()
    }
}

impl VerificationPipeline {
    pub fn new(
        agent: Agent,
        validator: PromptValidator,
        slack: Arc<dyn SlackApi>,
        queue: Arc<dyn QueueSender>,
    ) -> Self {
        Self {
            agent,
            validator,
            slack,
            queue,
            context_limit: 20,
            context_timeout: Duration::from_secs(10),
        }
    }

    /// Limit and timeout of the thread-history fetch.
    pub fn with_thread_context(mut self, limit: usize, timeout: Duration) -> Self {
        self.context_limit = limit;
        self.context_timeout = timeout;
        self
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    #[instrument(skip_all, fields(correlation_id = %request.correlation_id, channel = %request.channel))]
    pub async fn run(&self, request: VerificationRequest) -> AppResult<VerificationOutcome> {
        let mut post = SlackPostRequest::new(
            request.channel.clone(),
            request.bot_token.clone(),
            request.correlation_id.clone(),
        );
        if let Some(thread_ts) = request.thread_ts.as_ref().or(request.message_ts.as_ref()) {
            post = post.in_thread(thread_ts.clone());
        }
        if let Some(message_ts) = &request.message_ts {
            post = post.for_message(message_ts.clone());
        }

        if let Err(message) = self.validator.validate(&request.prompt).into_result() {
            info!("Prompt rejected at the agent boundary");
            let message_id = self.enqueue(&post.with_text(message)).await?;
            return Ok(self.outcome(&request, OutcomeStatus::Rejected, message_id, false, 0));
        }

        let prompt = match self.thread_context(&request).await {
            Some(context) => format!("{context}\n\nCurrent request:\n{}", request.prompt.trim()),
            None => request.prompt.trim().to_string(),
        };

        let (post, status, has_file, tool_calls) =
            match self.agent.run(&prompt, Some(&request.correlation_id)).await {
                Ok(response) => {
                    let has_file = response.file.is_some();
                    let mut post = post;
                    if !response.text.is_empty() {
                        post = post.with_text(response.text);
                    }
                    if let Some(file) = &response.file {
                        post = post.with_file(file.to_artifact());
                    }
                    (post, OutcomeStatus::Answered, has_file, response.tool_calls)
                }
                Err(e) => {
                    error!(error = %e, "Verification agent failed");
                    (post.with_text(FAILURE_REPLY), OutcomeStatus::Failed, false, 0)
                }
            };

        let message_id = self.enqueue(&post).await?;
        info!(status = ?status, has_file, tool_calls, %message_id, "Reply enqueued");
        Ok(self.outcome(&request, status, message_id, has_file, tool_calls))
    }

    fn outcome(
        &self,
        request: &VerificationRequest,
        status: OutcomeStatus,
        message_id: String,
        has_file: bool,
        tool_calls: usize,
    ) -> VerificationOutcome {
        VerificationOutcome {
            status,
            correlation_id: request.correlation_id.clone(),
            message_id,
            has_file,
            tool_calls,
        }
    }

    async fn enqueue(&self, post: &SlackPostRequest) -> AppResult<String> {
        let body = serde_json::to_string(post)
            .map_err(|e| AppError::Internal(format!("failed to encode post request: {e}")))?;
        self.queue.send(&body).await.map_err(|e| {
            error!(correlation_id = %post.correlation_id, error = %e, "Failed to enqueue Slack post request");
            AppError::from(e)
        })
    }

    /// Earlier messages of the thread, formatted for the prompt.
    async fn thread_context(&self, request: &VerificationRequest) -> Option<String> {
        if !request.is_thread_reply() || self.context_limit == 0 {
            return None;
        }
        let thread_ts = request.thread_ts.as_deref()?;

        let fetch = self.slack.thread_messages(
            &request.bot_token,
            &request.channel,
            thread_ts,
            self.context_limit,
        );
        let messages = match tokio::time::timeout(self.context_timeout, fetch).await {
            Ok(Ok(messages)) => messages,
            Ok(Err(e)) => {
                warn!(error = %e, "Could not fetch thread context");
                return None;
            }
            Err(_) => {
                warn!(timeout_secs = self.context_timeout.as_secs(), "Thread context fetch timed out");
                return None;
            }
        };

        format_thread_context(&messages, request.message_ts.as_deref())
    }
}

/// Render thread history, skipping the triggering message.
pub fn format_thread_context(messages: &[ThreadMessage], current_ts: Option<&str>) -> Option<String> {
    let lines: Vec<String> = messages
        .iter()
        .filter(|m| Some(m.ts.as_str()) != current_ts)
        .filter(|m| !m.text.trim().is_empty())
        .map(|m| {
            let speaker = if m.is_from_bot() { "assistant" } else { "user" };
            let text = slackagent_guard::strip_mentions(m.text.trim());
            let text = if text.chars().count() > MAX_CONTEXT_MESSAGE_CHARS {
                let cut: String = text.chars().take(MAX_CONTEXT_MESSAGE_CHARS).collect();
                format!("{cut}...")
            } else {
                text
            };
            format!("- {speaker}: {}", text.replace('\n', " "))
        })
        .collect();

    if lines.is_empty() {
        return None;
    }
    Some(format!("Earlier messages in this thread:\n{}", lines.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use slackagent_aws::{AwsError, AwsResult, InMemoryQueue};
    use slackagent_engine::client::{ContentBlock, ModelResponse};
    use slackagent_engine::{AgentSettings, ScriptedModel};
    use slackagent_protocol::FileArtifact;
    use slackagent_slack::{RecordedCall, RecordingSlack};
    use slackagent_tools::{TextFileTool, ToolSet};
    use std::sync::atomic::Ordering;

    struct BrokenQueue;

    #[async_trait::async_trait]
    impl QueueSender for BrokenQueue {
        async fn send(&self, _body: &str) -> AwsResult<String> {
            Err(AwsError::InvalidResponse("queue is down".into()))
        }
    }

    fn agent(model: Arc<ScriptedModel>) -> Agent {
        Agent::new(
            "verification",
            "Answer.",
            ToolSet::new().with(TextFileTool::new()),
            model,
            AgentSettings::default(),
        )
    }

    fn request(prompt: &str) -> VerificationRequest {
        VerificationRequest {
            prompt: prompt.into(),
            channel: "C1".into(),
            thread_ts: Some("100.0".into()),
            message_ts: Some("100.0".into()),
            team_id: Some("T1".into()),
            user_id: Some("U1".into()),
            bot_token: "xoxb-1".into(),
            correlation_id: "corr-1".into(),
        }
    }

    async fn posted(queue: &InMemoryQueue) -> Vec<SlackPostRequest> {
        queue
            .bodies()
            .await
            .iter()
            .map(|b| serde_json::from_str(b).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_answer_with_file_is_enqueued() {
        let model = Arc::new(ScriptedModel::new([
            ModelResponse::tool_use(
                "t1",
                "generate_text_file",
                json!({"file_name": "todo.md", "content": "- a"}),
            ),
            ModelResponse::text("Here is the list."),
        ]));
        let queue = Arc::new(InMemoryQueue::new());
        let slack = Arc::new(RecordingSlack::new());
        let pipeline =
            VerificationPipeline::new(agent(model), PromptValidator::lenient(), slack.clone(), queue.clone());

        let outcome = pipeline.run(request("make a todo list")).await.unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Answered);
        assert!(outcome.has_file);
        assert_eq!(outcome.tool_calls, 1);

        let posts = posted(&queue).await;
        assert_eq!(posts.len(), 1);
        let post = &posts[0];
        assert_eq!(post.text.as_deref(), Some("Here is the list."));
        assert_eq!(post.thread_ts.as_deref(), Some("100.0"));
        assert_eq!(post.message_ts.as_deref(), Some("100.0"));
        assert_eq!(post.correlation_id, "corr-1");
        let artifact: &FileArtifact = post.file_artifact.as_ref().unwrap();
        assert_eq!(artifact.file_name, "todo.md");
        assert_eq!(artifact.decode().unwrap(), b"- a".to_vec());

        // Not a thread reply: no history fetch.
        assert!(slack.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_prompt_sends_reason() {
        let model = Arc::new(ScriptedModel::default());
        let queue = Arc::new(InMemoryQueue::new());
        let pipeline = VerificationPipeline::new(
            agent(model.clone()),
            PromptValidator::lenient().with_max_length(10),
            Arc::new(RecordingSlack::new()),
            queue.clone(),
        );

        let outcome = pipeline.run(request("this prompt is far too long")).await.unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Rejected);
        assert!(model.requests().is_empty());
        let posts = posted(&queue).await;
        assert!(posts[0].text.as_deref().unwrap().contains("too long"));
    }

    #[tokio::test]
    async fn test_thread_context_prepended() {
        let model = Arc::new(ScriptedModel::new([ModelResponse::text("Sure.")]));
        let slack = Arc::new(RecordingSlack::new().with_thread(vec![
            ThreadMessage {
                user: Some("U1".into()),
                bot_id: None,
                text: "<@UBOT> summarise the plan".into(),
                ts: "100.0".into(),
            },
            ThreadMessage {
                user: None,
                bot_id: Some("B1".into()),
                text: "The plan has three steps.".into(),
                ts: "101.0".into(),
            },
            ThreadMessage {
                user: Some("U1".into()),
                bot_id: None,
                text: "and the second?".into(),
                ts: "102.0".into(),
            },
        ]));
        let pipeline = VerificationPipeline::new(
            agent(model.clone()),
            PromptValidator::lenient(),
            slack.clone(),
            Arc::new(InMemoryQueue::new()),
        );

        let mut req = request("and the second?");
        req.message_ts = Some("102.0".into());
        pipeline.run(req).await.unwrap();

        assert!(matches!(
            &slack.calls()[0],
            RecordedCall::ThreadMessages { thread_ts, limit: 20, .. } if thread_ts == "100.0"
        ));
        let sent = &model.requests()[0].messages[0].content[0];
        let ContentBlock::Text(prompt) = sent else {
            panic!("expected text prompt");
        };
        assert_eq!(
            prompt,
            "Earlier messages in this thread:\n- user: summarise the plan\n- assistant: The plan has three steps.\n\nCurrent request:\nand the second?"
        );
    }

    #[tokio::test]
    async fn test_thread_context_failure_is_ignored() {
        let model = Arc::new(ScriptedModel::new([ModelResponse::text("Sure.")]));
        let slack = Arc::new(RecordingSlack::new());
        slack.fail_history.store(true, Ordering::SeqCst);
        let queue = Arc::new(InMemoryQueue::new());
        let pipeline = VerificationPipeline::new(
            agent(model.clone()),
            PromptValidator::lenient(),
            slack,
            queue.clone(),
        );

        let mut req = request("follow up");
        req.message_ts = Some("105.0".into());
        let outcome = pipeline.run(req).await.unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Answered);
        assert_eq!(
            model.requests()[0].messages[0].text(),
            "follow up"
        );
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_agent_failure_sends_apology() {
        // An empty script makes the model fail.
        let model = Arc::new(ScriptedModel::default());
        let queue = Arc::new(InMemoryQueue::new());
        let pipeline = VerificationPipeline::new(
            agent(model),
            PromptValidator::lenient(),
            Arc::new(RecordingSlack::new()),
            queue.clone(),
        );
        let outcome = pipeline.run(request("hello")).await.unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(posted(&queue).await[0].text.as_deref(), Some(FAILURE_REPLY));
    }

    #[tokio::test]
    async fn test_queue_failure_is_returned() {
        let model = Arc::new(ScriptedModel::new([ModelResponse::text("Hi!")]));
        let pipeline = VerificationPipeline::new(
            agent(model),
            PromptValidator::lenient(),
            Arc::new(RecordingSlack::new()),
            Arc::new(BrokenQueue),
        );
        let err = pipeline.run(request("hello")).await.unwrap_err();
        assert!(matches!(err, AppError::Dependency(_)));
    }

    #[test]
    fn test_format_thread_context_skips_blank() {
        let messages = vec![ThreadMessage {
            user: Some("U1".into()),
            bot_id: None,
            text: "  ".into(),
            ts: "1.0".into(),
        }];
        assert_eq!(format_thread_context(&messages, None), None);
    }
}
