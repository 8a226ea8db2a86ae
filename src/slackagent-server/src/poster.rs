//! Queue consumer that delivers replies to Slack.
//!
//! Each queue message is one [`SlackPostRequest`]. Text goes through the
//! [`ReplyRouter`], the file artifact is uploaded into the same thread, and
//! the status reactions on the triggering message are swapped. Reaction
//! failures never fail a delivery. A message is deleted from the queue only
//! after a successful delivery, so failures are redelivered.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use slackagent_aws::sqs::{MAX_BATCH, MAX_WAIT_SECONDS};
use slackagent_aws::{AwsResult, QueueMessage, QueueReceiver};
use slackagent_protocol::SlackPostRequest;
use slackagent_slack::{
    FileUpload, REACTION_DONE, REACTION_PROCESSING, SlackApi, SlackError, SlackResult,
};

use crate::reply_router::{ReplyRouter, ReplyTarget};

/// Pause after a failed receive before polling again.
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Delivers one post request.
#[derive(Clone)]
pub struct SlackPoster {
    slack: Arc<dyn SlackApi>,
    router: ReplyRouter,
}

impl std::fmt::Debug for SlackPoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackPoster")
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

impl SlackPoster {
    pub fn new(slack: Arc<dyn SlackApi>, canvas_enabled: bool) -> Self {
        Self {
            router: ReplyRouter::new(Arc::clone(&slack), canvas_enabled),
            slack,
        }
    }

    /// Post text and file, then swap reactions.
    #[instrument(skip_all, fields(correlation_id = %request.correlation_id, channel = %request.channel))]
    pub async fn deliver(&self, request: &SlackPostRequest) -> SlackResult<()> {
        if !request.has_content() {
            warn!("Post request has neither text nor file");
        }

        if let Some(text) = request.text.as_deref().filter(|t| !t.trim().is_empty()) {
            let target = ReplyTarget {
                token: &request.bot_token,
                channel: &request.channel,
                thread_ts: request.thread_ts.as_deref(),
                correlation_id: &request.correlation_id,
            };
            let delivery = self.router.deliver(&target, text).await?;
            debug!(?delivery, "Text delivered");
        }

        if let Some(artifact) = &request.file_artifact {
            let file = artifact
                .clone()
                .into_generated_file(artifact.file_name.clone())
                .map_err(|e| SlackError::InvalidPayload(format!("file artifact: {e}")))?;
            let file_name = file.file_name.clone();
            let upload = FileUpload::from_generated(file, &request.channel, request.thread_ts.clone());
            let file_id = self.slack.upload_file(&request.bot_token, upload).await?;
            info!(%file_name, %file_id, "File uploaded");
        }

        if let Some(message_ts) = &request.message_ts {
            self.swap_reactions(request, message_ts).await;
        }
        Ok(())
    }

    async fn swap_reactions(&self, request: &SlackPostRequest, message_ts: &str) {
        if let Err(e) = self
            .slack
            .remove_reaction(&request.bot_token, &request.channel, message_ts, REACTION_PROCESSING)
            .await
        {
            warn!(error = %e, "Failed to remove processing reaction");
        }
        if let Err(e) = self
            .slack
            .add_reaction(&request.bot_token, &request.channel, message_ts, REACTION_DONE)
            .await
        {
            warn!(error = %e, "Failed to add done reaction");
        }
    }
}

/// What happened to one queue message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Delivered,
    /// Left on the queue for redelivery.
    Retried,
    /// Unreadable payload, removed from the queue.
    Discarded,
}

/// Long-polls the queue and hands messages to a [`SlackPoster`].
#[derive(Clone)]
pub struct PosterWorker {
    queue: Arc<dyn QueueReceiver>,
    poster: SlackPoster,
    batch_size: u32,
    wait_seconds: u32,
}

impl std::fmt::Debug for PosterWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PosterWorker")
            .field("poster", &self.poster)
            .field("batch_size", &self.batch_size)
            .field("wait_seconds", &self.wait_seconds)
            .finish_non_exhaustive()
    }
}

impl PosterWorker {
    pub fn new(queue: Arc<dyn QueueReceiver>, poster: SlackPoster) -> Self {
        Self {
            queue,
            poster,
            batch_size: MAX_BATCH,
            wait_seconds: MAX_WAIT_SECONDS,
        }
    }

    pub fn with_wait_seconds(mut self, wait_seconds: u32) -> Self {
        self.wait_seconds = wait_seconds.min(MAX_WAIT_SECONDS);
        self
    }

    /// Receive one batch and process it.
    pub async fn poll_once(&self) -> AwsResult<Vec<MessageOutcome>> {
        let messages = self.queue.receive(self.batch_size, self.wait_seconds).await?;
        let mut outcomes = Vec::with_capacity(messages.len());
        for message in messages {
            outcomes.push(self.handle(message).await);
        }
        Ok(outcomes)
    }

    async fn handle(&self, message: QueueMessage) -> MessageOutcome {
        let request: SlackPostRequest = match serde_json::from_str(&message.body) {
            Ok(request) => request,
            Err(e) => {
                error!(message_id = %message.message_id, error = %e, "Discarding unreadable post request");
                self.delete(&message).await;
                return MessageOutcome::Discarded;
            }
        };

        match self.poster.deliver(&request).await {
            Ok(()) => {
                self.delete(&message).await;
                MessageOutcome::Delivered
            }
            Err(e) => {
                error!(
                    message_id = %message.message_id,
                    correlation_id = %request.correlation_id,
                    error = %e,
                    "Delivery failed, leaving message for redelivery"
                );
                MessageOutcome::Retried
            }
        }
    }

    async fn delete(&self, message: &QueueMessage) {
        if let Err(e) = self.queue.delete(&message.receipt_handle).await {
            warn!(message_id = %message.message_id, error = %e, "Failed to delete queue message");
        }
    }

    /// Poll until `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);
        info!(wait_seconds = self.wait_seconds, "Poster started");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                result = self.poll_once() => {
                    if let Err(e) = result {
                        error!(error = %e, "Failed to receive from the queue");
                        tokio::select! {
                            _ = &mut shutdown => break,
                            _ = tokio::time::sleep(RECEIVE_ERROR_BACKOFF) => {}
                        }
                    }
                }
            }
        }
        info!("Poster stopped");
    }
}
