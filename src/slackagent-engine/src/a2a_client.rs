//! HTTP client for other agents' A2A surfaces.
//!
//! Specialists are called with the `execute_task` JSON-RPC method on their
//! root path; the verification agent is called on `/invocations` with the
//! Slack context. Requests are SigV4-signed when a signer is configured.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use slackagent_aws::SigV4Signer;
use slackagent_protocol::{
    ExecuteTaskParams, JsonRpcRequest, JsonRpcResponse, TaskResult, methods,
};
use slackagent_tools::{AgentInvoker, ToolError, ToolResult};

use crate::error::{EngineError, Result};

/// Service name AgentCore runtime requests are signed for.
pub const AGENTCORE_SIGNING_SERVICE: &str = "bedrock-agentcore";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Calls agents by name.
#[derive(Debug, Clone)]
pub struct A2aClient {
    http: reqwest::Client,
    endpoints: HashMap<String, Url>,
    signer: Option<SigV4Signer>,
    timeout: Duration,
}

impl A2aClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            endpoints: HashMap::new(),
            signer: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Register the base URL of `agent`.
    pub fn with_endpoint(mut self, agent: impl Into<String>, url: Url) -> Self {
        self.endpoints.insert(agent.into(), url);
        self
    }

    pub fn with_signer(mut self, signer: SigV4Signer) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Names of the agents with a registered endpoint.
    pub fn agents(&self) -> Vec<&str> {
        let mut agents: Vec<&str> = self.endpoints.keys().map(String::as_str).collect();
        agents.sort_unstable();
        agents
    }

    pub fn has_agent(&self, agent: &str) -> bool {
        self.endpoints.contains_key(agent)
    }

    fn endpoint(&self, agent: &str, path: &str) -> Result<Url> {
        let base = self
            .endpoints
            .get(agent)
            .ok_or_else(|| EngineError::UnknownAgent(agent.to_string()))?;
        let mut url = base.clone();
        let joined = format!("{}/{}", base.path().trim_end_matches('/'), path);
        url.set_path(&joined);
        Ok(url)
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: Url,
        body: &T,
        correlation_id: Option<&str>,
    ) -> Result<(reqwest::StatusCode, String)> {
        let mut builder = self
            .http
            .post(url)
            .header("content-type", "application/json")
            .timeout(self.timeout)
            .body(serde_json::to_vec(body)?);
        if let Some(id) = correlation_id {
            builder = builder.header("x-correlation-id", id);
        }
        let mut request = builder.build()?;
        if let Some(signer) = &self.signer {
            signer.sign(&mut request)?;
        }

        let response = self.http.execute(request).await?;
        let status = response.status();
        let text = response.text().await?;
        Ok((status, text))
    }

    /// Call `execute_task` on `agent`.
    pub async fn execute_task(&self, agent: &str, params: ExecuteTaskParams) -> Result<TaskResult> {
        let url = self.endpoint(agent, "")?;
        let correlation_id = params.correlation_id.clone();
        let request = JsonRpcRequest::call(
            Uuid::new_v4().to_string(),
            methods::EXECUTE_TASK,
            serde_json::to_value(&params)?,
        );

        debug!(agent, %url, correlation_id = ?correlation_id, "Calling execute_task");
        let (status, body) = self
            .post_json(url, &request, correlation_id.as_deref())
            .await?;

        // JSON-RPC errors come back with 200; anything else is transport.
        let response: JsonRpcResponse = serde_json::from_str(&body).map_err(|_| {
            EngineError::Remote {
                agent: agent.to_string(),
                code: i32::from(status.as_u16()),
                message: body.chars().take(200).collect(),
            }
        })?;

        let result = response.into_result().map_err(|err| {
            warn!(agent, code = err.code, message = %err.message, "Agent returned an error");
            EngineError::Remote {
                agent: agent.to_string(),
                code: err.code,
                message: err.message,
            }
        })?;
        serde_json::from_value(result)
            .map_err(|e| EngineError::InvalidResponse(format!("{agent}: {e}")))
    }

    /// POST `body` to `/invocations` of `agent` and return the JSON reply.
    pub async fn post_invocation<T: Serialize + ?Sized>(
        &self,
        agent: &str,
        body: &T,
        correlation_id: Option<&str>,
    ) -> Result<Value> {
        let url = self.endpoint(agent, "invocations")?;
        let (status, text) = self.post_json(url, body, correlation_id).await?;
        if !status.is_success() {
            return Err(EngineError::Remote {
                agent: agent.to_string(),
                code: i32::from(status.as_u16()),
                message: text.chars().take(200).collect(),
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl AgentInvoker for A2aClient {
    async fn invoke(&self, agent: &str, params: ExecuteTaskParams) -> ToolResult<TaskResult> {
        self.execute_task(agent, params).await.map_err(|e| match e {
            EngineError::UnknownAgent(agent) => {
                ToolError::Unavailable(format!("no endpoint is configured for the {agent} agent"))
            }
            EngineError::Network(err) if err.is_timeout() => {
                ToolError::Unavailable(format!("the {agent} agent did not answer in time"))
            }
            other => ToolError::Http(other.to_string()),
        })
    }
}
