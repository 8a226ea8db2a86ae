//! Error types for Slack operations.

use thiserror::Error;

/// Errors that can occur during Slack operations.
#[derive(Error, Debug)]
pub enum SlackError {
    /// Authentication error (invalid token, revoked, etc.).
    #[error("Authentication error: {0}")]
    Auth(String),

    /// API request failed.
    #[error("Slack API error: {0}")]
    Api(String),

    /// API rate limited.
    #[error("Rate limited: retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Network(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// Request signature verification failed.
    #[error("Signature verification failed: {0}")]
    SignatureVerification(String),

    /// Operation timed out.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Channel not found or bot not in channel.
    #[error("Channel error: {0}")]
    Channel(String),

    /// Invalid payload received from Slack.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// File upload failed.
    #[error("Upload error: {0}")]
    Upload(String),
}

impl From<reqwest::Error> for SlackError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SlackError::Timeout(err.to_string())
        } else if err.is_connect() {
            SlackError::Network(format!("Connection failed: {err}"))
        } else {
            SlackError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SlackError {
    fn from(err: serde_json::Error) -> Self {
        SlackError::Json(err.to_string())
    }
}

/// Result type for Slack operations.
pub type SlackResult<T> = std::result::Result<T, SlackError>;

/// An `{"ok": false, "error": "..."}` answer from the Web API.
#[derive(Debug, Clone)]
pub struct SlackApiError {
    /// Error code from Slack (e.g., "channel_not_found").
    pub code: String,
    /// API method that failed.
    pub method: String,
    /// Whether this error is retryable.
    pub retryable: bool,
}

impl SlackApiError {
    pub fn new(method: impl Into<String>, code: impl Into<String>) -> Self {
        let code = code.into();
        let retryable = Self::is_retryable_code(&code);
        Self {
            code,
            method: method.into(),
            retryable,
        }
    }

    fn is_retryable_code(code: &str) -> bool {
        matches!(
            code,
            "ratelimited"
                | "rate_limited"
                | "service_unavailable"
                | "internal_error"
                | "request_timeout"
                | "fatal_error"
        )
    }
}

impl From<SlackApiError> for SlackError {
    fn from(err: SlackApiError) -> Self {
        match err.code.as_str() {
            "ratelimited" | "rate_limited" => SlackError::RateLimited {
                retry_after_secs: 30,
            },
            "invalid_auth" | "not_authed" | "account_inactive" | "token_revoked" => {
                SlackError::Auth(format!("{}: {}", err.method, err.code))
            }
            "channel_not_found" | "not_in_channel" | "is_archived" => {
                SlackError::Channel(format!("{}: {}", err.method, err.code))
            }
            _ => SlackError::Api(format!("{}: {}", err.method, err.code)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SlackError::RateLimited {
            retry_after_secs: 60,
        };
        assert_eq!(err.to_string(), "Rate limited: retry after 60 seconds");
    }

    #[test]
    fn test_api_error_retryable() {
        assert!(SlackApiError::new("chat.postMessage", "ratelimited").retryable);
        assert!(!SlackApiError::new("chat.postMessage", "channel_not_found").retryable);
    }

    #[test]
    fn test_api_error_conversion() {
        let err: SlackError = SlackApiError::new("auth.test", "invalid_auth").into();
        assert!(matches!(err, SlackError::Auth(_)));

        let err: SlackError = SlackApiError::new("chat.postMessage", "not_in_channel").into();
        assert!(matches!(err, SlackError::Channel(ref m) if m == "chat.postMessage: not_in_channel"));

        let err: SlackError = SlackApiError::new("files.info", "file_not_found").into();
        assert_eq!(err.to_string(), "Slack API error: files.info: file_not_found");
    }
}
