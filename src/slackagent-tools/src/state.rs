//! Per-invocation scratch state shared by the tools of one agent run.

use std::sync::Mutex;

use slackagent_protocol::GeneratedFile;
use tracing::warn;

/// Holds the file generated during one agent invocation.
///
/// A fresh state is created for every invocation and dropped at its end,
/// so nothing leaks between concurrent requests.
#[derive(Debug, Default)]
pub struct InvocationState {
    file: Mutex<Option<GeneratedFile>>,
    correlation_id: Option<String>,
}

impl InvocationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_correlation_id(correlation_id: impl Into<String>) -> Self {
        Self {
            file: Mutex::new(None),
            correlation_id: Some(correlation_id.into()),
        }
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Store a generated file. A file stored earlier in the same
    /// invocation is replaced; returns `true` when that happened.
    pub fn store(&self, file: GeneratedFile) -> bool {
        let mut slot = self.file.lock().unwrap_or_else(|e| e.into_inner());
        let replaced = slot.is_some();
        if let Some(previous) = slot.as_ref() {
            warn!(
                previous = %previous.file_name,
                next = %file.file_name,
                "Replacing file generated earlier in this invocation"
            );
        }
        *slot = Some(file);
        replaced
    }

    /// Remove and return the stored file.
    pub fn take(&self) -> Option<GeneratedFile> {
        self.file.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    pub fn has_file(&self) -> bool {
        self.file.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }
}
