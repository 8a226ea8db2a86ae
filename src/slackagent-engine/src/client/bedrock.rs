//! Bedrock Runtime Converse API client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use slackagent_aws::SigV4Signer;

use super::types::{ContentBlock, Message, ModelRequest, ModelResponse, Role, StopReason, TokenUsage};
use super::ModelClient;
use crate::error::{EngineError, Result};

/// Service name Bedrock Runtime requests are signed for.
pub const SIGNING_SERVICE: &str = "bedrock";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Connection settings.
#[derive(Debug, Clone)]
pub struct BedrockSettings {
    pub model_id: String,
    /// Overrides the regional endpoint (tests, VPC endpoints).
    pub endpoint: Option<Url>,
    pub timeout: Duration,
}

impl BedrockSettings {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            endpoint: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = Some(endpoint);
        self
    }
}

/// Calls `POST /model/{modelId}/converse`, SigV4-signed.
#[derive(Debug, Clone)]
pub struct BedrockClient {
    http: reqwest::Client,
    signer: SigV4Signer,
    converse_url: Url,
    settings: BedrockSettings,
}

impl BedrockClient {
    pub fn new(http: reqwest::Client, signer: SigV4Signer, settings: BedrockSettings) -> Result<Self> {
        let base = match &settings.endpoint {
            Some(endpoint) => endpoint.as_str().trim_end_matches('/').to_string(),
            None => format!("https://bedrock-runtime.{}.amazonaws.com", signer.region()),
        };
        let converse_url = Url::parse(&format!(
            "{base}/model/{}/converse",
            urlencoding::encode(&settings.model_id)
        ))
        .map_err(|e| EngineError::Config(format!("invalid Bedrock endpoint: {e}")))?;

        Ok(Self {
            http,
            signer,
            converse_url,
            settings,
        })
    }

    pub fn converse_url(&self) -> &Url {
        &self.converse_url
    }
}

#[async_trait]
impl ModelClient for BedrockClient {
    fn model(&self) -> &str {
        &self.settings.model_id
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse> {
        let body = serde_json::to_vec(&converse_body(&request))?;
        let mut http_request = self
            .http
            .post(self.converse_url.clone())
            .header("content-type", "application/json")
            .header("accept", "application/json")
            .timeout(self.settings.timeout)
            .body(body)
            .build()?;
        self.signer.sign(&mut http_request)?;

        let response = self.http.execute(http_request).await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| {
                    v.get("message")
                        .or_else(|| v.get("Message"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_else(|| text.chars().take(200).collect());
            return Err(EngineError::Model {
                status: status.as_u16(),
                message,
            });
        }

        let wire: ConverseResponse = serde_json::from_str(&text)
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))?;
        let response = wire.into_response()?;
        debug!(
            model = %self.settings.model_id,
            stop_reason = ?response.stop_reason,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Converse completed"
        );
        Ok(response)
    }
}

/// Converse request body.
fn converse_body(request: &ModelRequest) -> Value {
    let messages: Vec<Value> = request
        .messages
        .iter()
        .map(|message| {
            json!({
                "role": message.role,
                "content": message.content.iter().map(block_to_wire).collect::<Vec<_>>(),
            })
        })
        .collect();

    let mut body = json!({
        "messages": messages,
        "inferenceConfig": {
            "maxTokens": request.max_tokens,
            "temperature": request.temperature,
        },
    });
    if !request.system.is_empty() {
        body["system"] = json!([{ "text": request.system }]);
    }
    if !request.tools.is_empty() {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "toolSpec": {
                        "name": tool.name,
                        "description": tool.description,
                        "inputSchema": { "json": tool.parameters },
                    }
                })
            })
            .collect();
        body["toolConfig"] = json!({ "tools": tools });
    }
    body
}

fn block_to_wire(block: &ContentBlock) -> Value {
    match block {
        ContentBlock::Text(text) => json!({ "text": text }),
        ContentBlock::ToolUse { id, name, input } => json!({
            "toolUse": { "toolUseId": id, "name": name, "input": input }
        }),
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => json!({
            "toolResult": {
                "toolUseId": tool_use_id,
                "content": [{ "text": content }],
                "status": if *is_error { "error" } else { "success" },
            }
        }),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConverseResponse {
    output: ConverseOutput,
    stop_reason: String,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct ConverseOutput {
    message: Option<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Vec<Value>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl ConverseResponse {
    fn into_response(self) -> Result<ModelResponse> {
        let message = self
            .output
            .message
            .ok_or_else(|| EngineError::InvalidResponse("output.message is missing".to_string()))?;

        // Block kinds we do not use (reasoning, images) are skipped.
        let content = message
            .content
            .iter()
            .filter_map(|block| {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    return Some(ContentBlock::Text(text.to_string()));
                }
                let tool_use = block.get("toolUse")?;
                Some(ContentBlock::ToolUse {
                    id: tool_use.get("toolUseId")?.as_str()?.to_string(),
                    name: tool_use.get("name")?.as_str()?.to_string(),
                    input: tool_use.get("input").cloned().unwrap_or_else(|| json!({})),
                })
            })
            .collect();

        Ok(ModelResponse {
            message: Message {
                role: Role::Assistant,
                content,
            },
            stop_reason: StopReason::parse(&self.stop_reason),
            usage: self
                .usage
                .map(|u| TokenUsage {
                    input_tokens: u.input_tokens,
                    output_tokens: u.output_tokens,
                })
                .unwrap_or_default(),
        })
    }
}
