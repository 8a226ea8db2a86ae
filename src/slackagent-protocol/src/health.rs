//! Payload of the `GET /ping` health endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Agent health as reported to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PingStatus {
    /// Idle and ready.
    Healthy,
    /// Ready, but at least one invocation is in flight.
    HealthyBusy,
}

/// `/ping` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub status: PingStatus,
    pub agent: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

impl PingResponse {
    /// Build a response for the given number of in-flight invocations.
    pub fn new(agent: impl Into<String>, version: impl Into<String>, in_flight: usize) -> Self {
        Self {
            status: if in_flight > 0 {
                PingStatus::HealthyBusy
            } else {
                PingStatus::Healthy
            },
            agent: agent.into(),
            version: version.into(),
            timestamp: Utc::now(),
        }
    }
}
