//! A2A surface of an agent server.
//!
//! - `GET /ping` reports `Healthy` or `HealthyBusy`
//! - `GET /.well-known/agent-card.json` serves the persona's card
//! - `POST /` is the JSON-RPC 2.0 endpoint (`get_agent_card`, `execute_task`)
//! - `POST /invocations` is the runtime entrypoint
//!
//! JSON-RPC failures are reported in the response envelope with HTTP 200.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
};
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use slackagent_protocol::{
    AgentCard, ExecuteTaskParams, InvocationRequest, JSONRPC_VERSION, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, PingResponse, RequestId, TaskResult, VerificationRequest,
    methods,
};

use crate::error::{AppError, AppResult};
use crate::middleware::{CORRELATION_ID_HEADER, CorrelationId};
use crate::state::AgentState;

/// Create the A2A routes.
pub fn routes() -> Router<Arc<AgentState>> {
    Router::new()
        .route("/ping", get(ping))
        .route("/.well-known/agent-card.json", get(agent_card))
        .route("/", post(json_rpc))
        .route("/invocations", post(invocations))
}

async fn ping(State(state): State<Arc<AgentState>>) -> Json<PingResponse> {
    Json(state.ping())
}

async fn agent_card(State(state): State<Arc<AgentState>>) -> Json<AgentCard> {
    Json(state.card.clone())
}

/// Correlation ID from the params, else the header, else a fresh one.
fn correlation_id(explicit: Option<&str>, headers: &HeaderMap) -> String {
    explicit
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .or_else(|| {
            headers
                .get(CORRELATION_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| CorrelationId::new().0)
}

async fn json_rpc(
    State(state): State<Arc<AgentState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<JsonRpcResponse> {
    Json(dispatch(&state, &headers, &body).await)
}

/// Decode and answer one JSON-RPC request.
pub async fn dispatch(state: &AgentState, headers: &HeaderMap, body: &[u8]) -> JsonRpcResponse {
    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Unparseable JSON-RPC body");
            return JsonRpcResponse::error(None, JsonRpcError::parse_error(e.to_string()));
        }
    };
    let id = value
        .get("id")
        .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok());

    let request: JsonRpcRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => {
            return JsonRpcResponse::error(id, JsonRpcError::invalid_request(e.to_string()));
        }
    };
    if request.jsonrpc != JSONRPC_VERSION {
        return JsonRpcResponse::error(
            request.id,
            JsonRpcError::invalid_request(format!("unsupported jsonrpc version {}", request.jsonrpc)),
        );
    }

    match request.method.as_str() {
        methods::GET_AGENT_CARD => match serde_json::to_value(&state.card) {
            Ok(card) => JsonRpcResponse::success(request.id, card),
            Err(e) => JsonRpcResponse::error(request.id, JsonRpcError::internal_error(e.to_string())),
        },
        methods::EXECUTE_TASK => execute_task(state, headers, request.id, request.params).await,
        other => {
            warn!(method = other, "Unknown JSON-RPC method");
            JsonRpcResponse::error(request.id, JsonRpcError::method_not_found(other))
        }
    }
}

async fn execute_task(
    state: &AgentState,
    headers: &HeaderMap,
    id: Option<RequestId>,
    params: Option<Value>,
) -> JsonRpcResponse {
    let params: ExecuteTaskParams = match params {
        Some(params) => match serde_json::from_value(params) {
            Ok(params) => params,
            Err(e) => return JsonRpcResponse::error(id, JsonRpcError::invalid_params(e.to_string())),
        },
        None => ExecuteTaskParams::default(),
    };
    let Some(task) = params.task_text() else {
        return JsonRpcResponse::error(id, JsonRpcError::invalid_params("task is required"));
    };
    let correlation_id = correlation_id(params.correlation_id.as_deref(), headers);

    match run_agent(state, &task, &correlation_id).await {
        Ok(result) => match serde_json::to_value(&result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::error(id, JsonRpcError::internal_error(e.to_string())),
        },
        Err(e) => JsonRpcResponse::error(id, JsonRpcError::internal_error(e.to_string())),
    }
}

#[instrument(skip_all, fields(agent = %state.persona, correlation_id = %correlation_id))]
async fn run_agent(
    state: &AgentState,
    prompt: &str,
    correlation_id: &str,
) -> slackagent_engine::Result<TaskResult> {
    let _in_flight = state.begin_invocation();
    match state.agent.run(prompt, Some(correlation_id)).await {
        Ok(response) => {
            info!(tool_calls = response.tool_calls, has_file = response.file.is_some(), "Task completed");
            Ok(response.into_task_result(state.persona.as_str()))
        }
        Err(e) => {
            error!(error = %e, "Task failed");
            Err(e)
        }
    }
}

/// Runtime entrypoint. The verification persona takes the full Slack
/// context and answers through the queue; specialists answer inline.
async fn invocations(
    State(state): State<Arc<AgentState>>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    if let Some(pipeline) = &state.pipeline {
        let request: VerificationRequest = serde_json::from_slice(&body)?;
        let _in_flight = state.begin_invocation();
        let outcome = pipeline.run(request).await?;
        return Ok(Json(serde_json::to_value(outcome)?));
    }

    let request: InvocationRequest = serde_json::from_slice(&body)?;
    if request.prompt.trim().is_empty() {
        return Err(AppError::Validation("prompt is required".to_string()));
    }
    let correlation_id = correlation_id(request.correlation_id.as_deref(), &headers);
    let result = run_agent(&state, request.prompt.trim(), &correlation_id).await?;
    Ok(Json(serde_json::to_value(result)?))
}
