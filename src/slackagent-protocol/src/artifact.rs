//! Generated-file record and its base64 wire form.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors converting a wire artifact back into bytes.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Invalid base64 content: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Artifact has an empty file name")]
    EmptyFileName,
}

/// A file produced by a tool during one agent invocation.
#[derive(Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub file_bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
    pub description: String,
}

impl std::fmt::Debug for GeneratedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedFile")
            .field("file_bytes", &format_args!("<{} bytes>", self.file_bytes.len()))
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("description", &self.description)
            .finish()
    }
}

impl GeneratedFile {
    pub fn new(
        file_bytes: Vec<u8>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            file_bytes,
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            description: description.into(),
        }
    }

    /// Size of the content in bytes.
    pub fn len(&self) -> usize {
        self.file_bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file_bytes.is_empty()
    }

    /// Encode for transport in a queue message or JSON-RPC result.
    pub fn to_artifact(&self) -> FileArtifact {
        FileArtifact {
            content_base64: STANDARD.encode(&self.file_bytes),
            file_name: self.file_name.clone(),
            mime_type: self.mime_type.clone(),
        }
    }
}

/// Wire form of a [`GeneratedFile`] (`{contentBase64, fileName, mimeType}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileArtifact {
    pub content_base64: String,
    pub file_name: String,
    pub mime_type: String,
}

impl FileArtifact {
    /// Decode the content.
    pub fn decode(&self) -> Result<Vec<u8>, ArtifactError> {
        Ok(STANDARD.decode(self.content_base64.as_bytes())?)
    }

    /// Decode into a generated-file record with the given description.
    pub fn into_generated_file(
        self,
        description: impl Into<String>,
    ) -> Result<GeneratedFile, ArtifactError> {
        if self.file_name.trim().is_empty() {
            return Err(ArtifactError::EmptyFileName);
        }
        let bytes = self.decode()?;
        Ok(GeneratedFile::new(
            bytes,
            self.file_name,
            self.mime_type,
            description,
        ))
    }
}
