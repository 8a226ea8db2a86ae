//! Tool errors.
//!
//! The `Display` text of every variant is what the model sees, so messages
//! are written as plain sentences.

use thiserror::Error;

/// Result type for tool operations.
pub type ToolResult<T> = std::result::Result<T, ToolError>;

#[derive(Debug, Error)]
pub enum ToolError {
    /// Arguments missing or malformed.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The produced file would exceed the size limit.
    #[error("Generated file is too large ({size} bytes, limit {max} bytes)")]
    TooLarge { size: usize, max: usize },

    /// Document or image encoding failed.
    #[error("Failed to generate file: {0}")]
    Generation(String),

    /// A dependency (directory, endpoint, agent) is not available.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// The request was refused by policy (e.g. a private address).
    #[error("Blocked: {0}")]
    Blocked(String),

    /// Remote call failed.
    #[error("Request failed: {0}")]
    Http(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        ToolError::InvalidArguments(err.to_string())
    }
}

impl From<zip::result::ZipError> for ToolError {
    fn from(err: zip::result::ZipError) -> Self {
        ToolError::Generation(err.to_string())
    }
}

impl From<image::ImageError> for ToolError {
    fn from(err: image::ImageError) -> Self {
        ToolError::Generation(err.to_string())
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ToolError::Http("the request timed out".to_string())
        } else {
            ToolError::Http(err.to_string())
        }
    }
}

/// Reject files above [`crate::MAX_FILE_BYTES`].
pub(crate) fn ensure_size(size: usize) -> ToolResult<()> {
    if size > crate::MAX_FILE_BYTES {
        return Err(ToolError::TooLarge {
            size,
            max: crate::MAX_FILE_BYTES,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_sentences() {
        let err = ToolError::TooLarge { size: 11, max: 10 };
        assert_eq!(err.to_string(), "Generated file is too large (11 bytes, limit 10 bytes)");
        let err: ToolError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(err.to_string().starts_with("Invalid arguments:"));
    }

    #[test]
    fn test_ensure_size() {
        assert!(ensure_size(crate::MAX_FILE_BYTES).is_ok());
        assert!(ensure_size(crate::MAX_FILE_BYTES + 1).is_err());
    }
}
