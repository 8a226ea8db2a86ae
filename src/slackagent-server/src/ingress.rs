//! Slack Events API endpoint.
//!
//! Verifies the request signature, answers the URL verification handshake,
//! and hands accepted messages to the verification agent in the background
//! so Slack gets its acknowledgement within the three-second window.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use secrecy::ExposeSecret;
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use slackagent_engine::{A2aClient, Persona};
use slackagent_guard::sanitize_prompt;
use slackagent_protocol::VerificationRequest;
use slackagent_slack::{EventEnvelope, InboundMessage, REACTION_PROCESSING, verify_signature};

use crate::error::{AppError, AppResult};
use crate::pipeline::FAILURE_REPLY;
use crate::state::IngressState;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const RETRY_HEADER: &str = "x-slack-retry-num";

/// Hands a request to the verification agent.
#[async_trait]
pub trait VerificationInvoker: Send + Sync {
    async fn invoke(&self, request: VerificationRequest) -> slackagent_engine::Result<()>;
}

#[async_trait]
impl VerificationInvoker for A2aClient {
    async fn invoke(&self, request: VerificationRequest) -> slackagent_engine::Result<()> {
        let outcome = self
            .post_invocation(
                Persona::Verification.as_str(),
                &request,
                Some(&request.correlation_id),
            )
            .await?;
        debug!(correlation_id = %request.correlation_id, %outcome, "Verification agent answered");
        Ok(())
    }
}

/// Create the ingress routes.
pub fn routes() -> Router<Arc<IngressState>> {
    Router::new().route("/slack/events", post(slack_events))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

async fn slack_events(
    State(state): State<Arc<IngressState>>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    if !verify_signature(
        &state.signing_secret,
        header(&headers, TIMESTAMP_HEADER),
        &body,
        header(&headers, SIGNATURE_HEADER),
    ) {
        warn!("Rejected Slack request with an invalid signature");
        return Err(AppError::Authentication("invalid Slack signature".to_string()));
    }

    let envelope = EventEnvelope::parse(&body).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let callback = match envelope {
        EventEnvelope::UrlVerification { challenge } => {
            info!("Answering URL verification");
            return Ok(Json(json!({ "challenge": challenge })).into_response());
        }
        EventEnvelope::EventCallback(callback) => callback,
        EventEnvelope::Unknown => return Ok(StatusCode::OK.into_response()),
    };

    let retry = header(&headers, RETRY_HEADER);
    if !retry.is_empty() {
        info!(retry, event_id = ?callback.event_id, "Dropping Slack retry");
        return Ok(StatusCode::OK.into_response());
    }

    match callback.inbound_message() {
        Some(message) => accept_message(&state, message).await,
        None => debug!(event_id = ?callback.event_id, "Ignoring event"),
    }
    Ok(StatusCode::OK.into_response())
}

/// Validate, acknowledge with a reaction and dispatch one message.
async fn accept_message(state: &Arc<IngressState>, message: InboundMessage) {
    let team_id = message.team_id.clone().unwrap_or_default();
    let token = match state.tokens.bot_token(&team_id).await {
        Ok(Some(token)) => token.expose_secret().to_string(),
        Ok(None) => {
            error!(%team_id, "No bot token for workspace");
            return;
        }
        Err(e) => {
            error!(%team_id, error = %e, "Bot token lookup failed");
            return;
        }
    };

    let prompt = sanitize_prompt(&message.text);
    if let Err(reason) = state.validator.validate(&prompt).into_result() {
        info!(channel = %message.channel, %reason, "Prompt rejected");
        if let Err(e) = state
            .slack
            .post_message(&token, &message.channel, Some(&message.thread_ts), &reason)
            .await
        {
            warn!(error = %e, "Failed to post validation error");
        }
        return;
    }

    if let Err(e) = state
        .slack
        .add_reaction(&token, &message.channel, &message.message_ts, REACTION_PROCESSING)
        .await
    {
        warn!(error = %e, "Failed to add processing reaction");
    }

    let request = VerificationRequest {
        prompt,
        channel: message.channel,
        thread_ts: Some(message.thread_ts),
        message_ts: Some(message.message_ts),
        team_id: message.team_id,
        user_id: message.user_id,
        bot_token: token,
        correlation_id: Uuid::new_v4().to_string(),
    };
    info!(
        correlation_id = %request.correlation_id,
        channel = %request.channel,
        thread_reply = request.is_thread_reply(),
        "Dispatching to the verification agent"
    );
    tokio::spawn(invoke_verification(Arc::clone(state), request));
}

async fn invoke_verification(state: Arc<IngressState>, request: VerificationRequest) {
    let correlation_id = request.correlation_id.clone();
    let channel = request.channel.clone();
    let thread_ts = request.thread_ts.clone();
    let token = request.bot_token.clone();

    if let Err(e) = state.invoker.invoke(request).await {
        error!(%correlation_id, error = %e, "Verification agent invocation failed");
        if let Err(e) = state
            .slack
            .post_message(&token, &channel, thread_ts.as_deref(), FAILURE_REPLY)
            .await
        {
            warn!(%correlation_id, error = %e, "Failed to post failure reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use pretty_assertions::assert_eq;
    use slackagent_aws::StaticTokenStore;
    use slackagent_engine::EngineError;
    use slackagent_guard::PromptValidator;
    use slackagent_slack::{RecordedCall, RecordingSlack, compute_signature};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    const SECRET: &str = "signing-secret";

    struct ChannelInvoker {
        tx: mpsc::UnboundedSender<VerificationRequest>,
        fail: bool,
    }

    #[async_trait]
    impl VerificationInvoker for ChannelInvoker {
        async fn invoke(&self, request: VerificationRequest) -> slackagent_engine::Result<()> {
            let _ = self.tx.send(request);
            if self.fail {
                return Err(EngineError::Remote {
                    agent: "verification".to_string(),
                    code: 500,
                    message: "boom".to_string(),
                });
            }
            Ok(())
        }
    }

    struct Harness {
        app: Router,
        slack: Arc<RecordingSlack>,
        rx: mpsc::UnboundedReceiver<VerificationRequest>,
    }

    fn harness(fail: bool) -> Harness {
        let (tx, rx) = mpsc::unbounded_channel();
        let slack = Arc::new(RecordingSlack::new());
        let state = Arc::new(IngressState {
            signing_secret: SECRET.to_string(),
            tokens: Arc::new(StaticTokenStore::single("xoxb-test")),
            slack: slack.clone(),
            invoker: Arc::new(ChannelInvoker { tx, fail }),
            validator: PromptValidator::strict().with_max_length(50),
        });
        Harness {
            app: routes().with_state(state),
            slack,
            rx,
        }
    }

    fn signed(body: &str) -> HttpRequest<Body> {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            .to_string();
        HttpRequest::builder()
            .method("POST")
            .uri("/slack/events")
            .header(TIMESTAMP_HEADER, &ts)
            .header(SIGNATURE_HEADER, compute_signature(SECRET, &ts, body.as_bytes()))
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn mention(text: &str) -> String {
        json!({
            "type": "event_callback",
            "team_id": "T1",
            "event_id": "Ev1",
            "event": {
                "type": "app_mention",
                "user": "U1",
                "text": text,
                "channel": "C1",
                "ts": "100.0"
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_bad_signature_rejected() {
        let h = harness(false);
        let response = h
            .app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/slack/events")
                    .header(TIMESTAMP_HEADER, "1")
                    .header(SIGNATURE_HEADER, "v0=00")
                    .body(Body::from(mention("hi")))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_url_verification_echoes_challenge() {
        let h = harness(false);
        let body = r#"{"type":"url_verification","token":"t","challenge":"xyz"}"#;
        let response = h.app.oneshot(signed(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["challenge"], "xyz");
    }

    #[tokio::test]
    async fn test_mention_is_dispatched() {
        let mut h = harness(false);
        let response = h
            .app
            .oneshot(signed(&mention("<@UBOT> what's the plan?")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let request = tokio::time::timeout(Duration::from_secs(5), h.rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request.prompt, "what's the plan?");
        assert_eq!(request.channel, "C1");
        assert_eq!(request.thread_ts.as_deref(), Some("100.0"));
        assert_eq!(request.message_ts.as_deref(), Some("100.0"));
        assert_eq!(request.bot_token, "xoxb-test");
        assert!(Uuid::parse_str(&request.correlation_id).is_ok());

        assert_eq!(
            h.slack.calls(),
            vec![RecordedCall::AddReaction {
                channel: "C1".into(),
                ts: "100.0".into(),
                name: "eyes".into(),
            }]
        );
    }

    #[tokio::test]
    async fn test_retry_is_dropped() {
        let mut h = harness(false);
        let mut request = signed(&mention("hello"));
        request
            .headers_mut()
            .insert(RETRY_HEADER, "1".parse().unwrap());
        let response = h.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(h.rx.try_recv().is_err());
        assert!(h.slack.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_prompt_answered_in_thread() {
        let mut h = harness(false);
        let long = format!("<@UBOT> {}", "x".repeat(80));
        let response = h.app.oneshot(signed(&mention(&long))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(h.rx.try_recv().is_err());

        let posted = h.slack.posted_texts();
        assert_eq!(posted.len(), 1);
        assert!(posted[0].contains("too long"));
        assert!(!h
            .slack
            .calls()
            .iter()
            .any(|c| matches!(c, RecordedCall::AddReaction { .. })));
    }

    #[tokio::test]
    async fn test_bot_message_ignored() {
        let mut h = harness(false);
        let body = json!({
            "type": "event_callback",
            "team_id": "T1",
            "event": {
                "type": "message",
                "channel_type": "im",
                "bot_id": "B1",
                "text": "echo",
                "channel": "D1",
                "ts": "5.0"
            }
        })
        .to_string();
        let response = h.app.oneshot(signed(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(h.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_invocation_failure_posts_apology() {
        let mut h = harness(true);
        h.app
            .oneshot(signed(&mention("<@UBOT> hi")))
            .await
            .unwrap();
        h.rx.recv().await.unwrap();

        let posted = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let posted = h.slack.posted_texts();
                if !posted.is_empty() {
                    return posted;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(posted, vec![FAILURE_REPLY.to_string()]);
    }
}
