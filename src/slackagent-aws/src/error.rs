//! Error types for AWS calls.

use thiserror::Error;

/// Result type for AWS operations.
pub type AwsResult<T> = std::result::Result<T, AwsError>;

/// Errors raised by the AWS clients.
#[derive(Debug, Error)]
pub enum AwsError {
    /// Credentials could not be found.
    #[error("Missing AWS credentials: {0}")]
    MissingCredentials(String),

    /// The request could not be signed.
    #[error("Request signing failed: {0}")]
    Signing(String),

    /// Invalid endpoint or queue URL.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with an error document.
    #[error("{service} error ({status}): {code}: {message}")]
    Service {
        service: String,
        status: u16,
        code: String,
        message: String,
    },

    /// The service answered with something we could not interpret.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AwsError {
    /// Build a service error from an AWS JSON error document.
    ///
    /// AWS reports the error type in `__type` (sometimes prefixed with a
    /// namespace and `#`) and the text in `message` or `Message`.
    pub fn from_error_body(service: &str, status: u16, body: &str) -> Self {
        let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
        let code = parsed
            .as_ref()
            .and_then(|v| v.get("__type"))
            .and_then(|v| v.as_str())
            .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        let message = parsed
            .as_ref()
            .and_then(|v| v.get("message").or_else(|| v.get("Message")))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| body.chars().take(200).collect());

        Self::Service {
            service: service.to_string(),
            status,
            code,
            message,
        }
    }

    /// Whether retrying later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Service { status, code, .. } => {
                *status >= 500 || code.contains("Throttl") || code == "RequestTimeout"
            }
            _ => false,
        }
    }
}
