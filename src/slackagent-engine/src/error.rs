//! Error types for the agent runtime.

use thiserror::Error;

use slackagent_aws::AwsError;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Model errors
    #[error("Model error ({status}): {message}")]
    Model { status: u16, message: String },

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),

    #[error("Agent stopped after {steps} steps without a final answer")]
    MaxStepsExceeded { steps: usize },

    #[error("Model returned no text")]
    EmptyResponse,

    // Remote agents
    #[error("Agent {agent} failed ({code}): {message}")]
    Remote {
        agent: String,
        code: i32,
        message: String,
    },

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    // Transport
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("AWS error: {0}")]
    Aws(#[from] AwsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Whether the failure came from a dependency rather than the request.
    pub fn is_dependency_failure(&self) -> bool {
        matches!(
            self,
            Self::Model { .. } | Self::Network(_) | Self::Aws(_) | Self::Remote { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            EngineError::MaxStepsExceeded { steps: 8 }.to_string(),
            "Agent stopped after 8 steps without a final answer"
        );
        let err = EngineError::Remote {
            agent: "time".into(),
            code: -32602,
            message: "task is required".into(),
        };
        assert_eq!(err.to_string(), "Agent time failed (-32602): task is required");
        assert!(err.is_dependency_failure());
        assert!(!EngineError::EmptyResponse.is_dependency_failure());
    }
}
