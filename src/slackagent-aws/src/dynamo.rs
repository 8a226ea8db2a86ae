//! Workspace bot-token lookup.
//!
//! Each Slack workspace that installs the app gets its own bot token. The
//! installation flow writes `{team_id, bot_token}` items to a DynamoDB
//! table; the ingress reads them back per event.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Url;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::json;

use crate::client::{JsonProtocolClient, regional_endpoint};
use crate::error::{AwsError, AwsResult};
use crate::sigv4::SigV4Signer;

/// Attribute holding the token when none is configured.
pub const DEFAULT_TOKEN_ATTRIBUTE: &str = "bot_token";

/// Resolves the bot token for a workspace.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// `None` when the workspace is unknown.
    async fn bot_token(&self, team_id: &str) -> AwsResult<Option<SecretString>>;
}

/// Token lookup backed by a DynamoDB table keyed on `team_id`.
#[derive(Debug, Clone)]
pub struct DynamoTokenStore {
    client: JsonProtocolClient,
    table_name: String,
    token_attribute: String,
}

impl DynamoTokenStore {
    pub fn new(http: reqwest::Client, table_name: impl Into<String>, signer: SigV4Signer) -> AwsResult<Self> {
        let endpoint = regional_endpoint("dynamodb", signer.region())?;
        Ok(Self::with_endpoint(http, endpoint, table_name, signer))
    }

    /// Use a non-standard endpoint (local DynamoDB, tests).
    pub fn with_endpoint(
        http: reqwest::Client,
        endpoint: Url,
        table_name: impl Into<String>,
        signer: SigV4Signer,
    ) -> Self {
        Self {
            client: JsonProtocolClient::new(
                http,
                endpoint,
                signer.for_service("dynamodb"),
                "DynamoDB_20120810",
            ),
            table_name: table_name.into(),
            token_attribute: DEFAULT_TOKEN_ATTRIBUTE.to_string(),
        }
    }

    pub fn with_token_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.token_attribute = attribute.into();
        self
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetItemOutput {
    #[serde(default)]
    item: Option<HashMap<String, AttributeValue>>,
}

#[derive(Deserialize)]
struct AttributeValue {
    #[serde(rename = "S")]
    s: Option<String>,
}

#[async_trait]
impl TokenStore for DynamoTokenStore {
    async fn bot_token(&self, team_id: &str) -> AwsResult<Option<SecretString>> {
        let output: GetItemOutput = self
            .client
            .call(
                "GetItem",
                &json!({
                    "TableName": self.table_name,
                    "Key": {"team_id": {"S": team_id}},
                    "ProjectionExpression": "#t",
                    "ExpressionAttributeNames": {"#t": self.token_attribute},
                    "ConsistentRead": false,
                }),
                None,
            )
            .await?;

        let Some(mut item) = output.item else {
            tracing::debug!(team_id, "No installation found for workspace");
            return Ok(None);
        };
        match item.remove(&self.token_attribute).and_then(|v| v.s) {
            Some(token) if !token.is_empty() => Ok(Some(SecretString::from(token))),
            _ => Err(AwsError::InvalidResponse(format!(
                "item for team {team_id} has no string attribute {}",
                self.token_attribute
            ))),
        }
    }
}

/// Tokens known up front: a per-team map with an optional fallback used
/// for single-workspace deployments.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenStore {
    per_team: HashMap<String, SecretString>,
    fallback: Option<SecretString>,
}

impl StaticTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every team resolves to `token`.
    pub fn single(token: impl Into<String>) -> Self {
        Self {
            per_team: HashMap::new(),
            fallback: Some(SecretString::from(token.into())),
        }
    }

    pub fn with_team(mut self, team_id: impl Into<String>, token: impl Into<String>) -> Self {
        self.per_team
            .insert(team_id.into(), SecretString::from(token.into()));
        self
    }
}

#[async_trait]
impl TokenStore for StaticTokenStore {
    async fn bot_token(&self, team_id: &str) -> AwsResult<Option<SecretString>> {
        Ok(self
            .per_team
            .get(team_id)
            .or(self.fallback.as_ref())
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::AwsCredentials;
    use secrecy::ExposeSecret;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> DynamoTokenStore {
        DynamoTokenStore::with_endpoint(
            reqwest::Client::new(),
            Url::parse(&server.uri()).unwrap(),
            "slack-installations",
            SigV4Signer::new(AwsCredentials::new("AKID", "secret", None), "ap-northeast-1", "dynamodb"),
        )
    }

    #[tokio::test]
    async fn test_token_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", "DynamoDB_20120810.GetItem"))
            .and(body_partial_json(json!({
                "TableName": "slack-installations",
                "Key": {"team_id": {"S": "T123"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Item": {"bot_token": {"S": "xoxb-123"}}
            })))
            .mount(&server)
            .await;

        let token = store_for(&server).bot_token("T123").await.unwrap().unwrap();
        assert_eq!(token.expose_secret(), "xoxb-123");
    }

    #[tokio::test]
    async fn test_unknown_team() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        assert!(store_for(&server).bot_token("T999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_item_without_token_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Item": {"team_id": {"S": "T1"}}
            })))
            .mount(&server)
            .await;

        let result = store_for(&server).bot_token("T1").await;
        assert!(matches!(result, Err(AwsError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_static_store() {
        let store = StaticTokenStore::single("xoxb-default").with_team("T1", "xoxb-t1");
        let t1 = store.bot_token("T1").await.unwrap().unwrap();
        let other = store.bot_token("T2").await.unwrap().unwrap();
        assert_eq!(t1.expose_secret(), "xoxb-t1");
        assert_eq!(other.expose_secret(), "xoxb-default");
        assert!(StaticTokenStore::new().bot_token("T1").await.unwrap().is_none());
    }
}
