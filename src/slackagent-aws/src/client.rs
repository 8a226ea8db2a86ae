//! Signed AWS JSON-protocol calls (`X-Amz-Target` + `application/x-amz-json-1.0`).

use std::time::Duration;

use reqwest::Url;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{AwsError, AwsResult};
use crate::sigv4::SigV4Signer;

const CONTENT_TYPE: &str = "application/x-amz-json-1.0";

/// Posts signed JSON-protocol requests to one service endpoint.
#[derive(Debug, Clone)]
pub struct JsonProtocolClient {
    http: reqwest::Client,
    endpoint: Url,
    signer: SigV4Signer,
    target_prefix: String,
}

impl JsonProtocolClient {
    /// `target_prefix` is the part of `X-Amz-Target` before the operation
    /// name, e.g. `AmazonSQS` or `DynamoDB_20120810`.
    pub fn new(
        http: reqwest::Client,
        endpoint: Url,
        signer: SigV4Signer,
        target_prefix: impl Into<String>,
    ) -> Self {
        Self {
            http,
            endpoint,
            signer,
            target_prefix: target_prefix.into(),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Call `operation` with `payload`, decoding the JSON answer.
    pub async fn call<P, R>(
        &self,
        operation: &str,
        payload: &P,
        timeout: Option<Duration>,
    ) -> AwsResult<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = serde_json::to_vec(payload)?;
        let mut builder = self
            .http
            .post(self.endpoint.clone())
            .header("content-type", CONTENT_TYPE)
            .header("x-amz-target", format!("{}.{operation}", self.target_prefix))
            .body(body);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let mut request = builder.build()?;
        self.signer.sign(&mut request)?;

        let response = self.http.execute(request).await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::debug!(
                service = self.signer.service(),
                operation,
                status = status.as_u16(),
                "AWS call failed"
            );
            return Err(AwsError::from_error_body(
                self.signer.service(),
                status.as_u16(),
                &text,
            ));
        }

        // Some operations answer with an empty body on success.
        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| {
            AwsError::InvalidResponse(format!("{operation}: {e}"))
        })
    }
}

/// Regional endpoint for a service, e.g. `https://sqs.ap-northeast-1.amazonaws.com/`.
pub(crate) fn regional_endpoint(service: &str, region: &str) -> AwsResult<Url> {
    Url::parse(&format!("https://{service}.{region}.amazonaws.com/"))
        .map_err(|e| AwsError::InvalidEndpoint(e.to_string()))
}
