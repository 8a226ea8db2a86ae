//! Error types for the HTTP surfaces.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use slackagent_aws::AwsError;
use slackagent_engine::EngineError;
use slackagent_slack::SlackError;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Request signature missing or wrong.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The prompt or payload failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Malformed request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A model, queue or remote agent failed.
    #[error("Dependency error: {0}")]
    Dependency(String),

    /// Required configuration is missing.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Dependency(_) => StatusCode::BAD_GATEWAY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "authentication_failed",
            Self::Validation(_) => "validation_error",
            Self::BadRequest(_) => "bad_request",
            Self::Dependency(_) => "dependency_error",
            Self::Unavailable(_) => "service_unavailable",
            Self::Internal(_) => "internal_error",
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Error detail.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for the server.
pub type AppResult<T> = Result<T, AppError>;

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::BadRequest(error.to_string())
    }
}

impl From<EngineError> for AppError {
    fn from(error: EngineError) -> Self {
        match &error {
            EngineError::Config(message) => Self::Unavailable(message.clone()),
            e if e.is_dependency_failure() => Self::Dependency(error.to_string()),
            _ => Self::Internal(error.to_string()),
        }
    }
}

impl From<AwsError> for AppError {
    fn from(error: AwsError) -> Self {
        Self::Dependency(error.to_string())
    }
}

impl From<SlackError> for AppError {
    fn from(error: SlackError) -> Self {
        Self::Dependency(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AppError::Authentication("bad signature".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::from(EngineError::Model {
                status: 503,
                message: "overloaded".into()
            })
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::from(EngineError::MaxStepsExceeded { steps: 8 }).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::from(EngineError::Config("no tools".into())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::Validation("too long".into()).error_code(),
            "validation_error"
        );
        assert_eq!(AppError::BadRequest("x".into()).error_code(), "bad_request");
    }
}
