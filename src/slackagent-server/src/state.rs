//! Shared handler state for the agent and ingress servers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use slackagent_aws::TokenStore;
use slackagent_engine::{Agent, Persona};
use slackagent_guard::PromptValidator;
use slackagent_protocol::{AgentCard, PingResponse};
use slackagent_slack::SlackApi;

use crate::ingress::VerificationInvoker;
use crate::pipeline::VerificationPipeline;

/// State of an agent server: one persona, one agent.
pub struct AgentState {
    pub persona: Persona,
    pub card: AgentCard,
    pub agent: Agent,
    /// Present only for the verification persona.
    pub pipeline: Option<VerificationPipeline>,
    pub version: String,
    in_flight: AtomicUsize,
}

impl std::fmt::Debug for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentState")
            .field("persona", &self.persona)
            .field("version", &self.version)
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

impl AgentState {
    pub fn new(persona: Persona, agent: Agent, public_url: &str, version: impl Into<String>) -> Self {
        let version = version.into();
        Self {
            card: persona.agent_card(public_url, &version),
            persona,
            agent,
            pipeline: None,
            version,
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_pipeline(mut self, pipeline: VerificationPipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Number of invocations currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Mark an invocation as running until the guard drops.
    pub fn begin_invocation(&self) -> InFlight<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlight { counter: &self.in_flight }
    }

    pub fn ping(&self) -> PingResponse {
        PingResponse::new(self.persona.as_str(), &self.version, self.in_flight())
    }
}

/// Decrements the in-flight counter on drop.
#[derive(Debug)]
pub struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// State of the Slack events endpoint.
pub struct IngressState {
    pub signing_secret: String,
    pub tokens: Arc<dyn TokenStore>,
    pub slack: Arc<dyn SlackApi>,
    pub invoker: Arc<dyn VerificationInvoker>,
    pub validator: PromptValidator,
}

impl std::fmt::Debug for IngressState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngressState")
            .field("signing_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slackagent_engine::{AgentFactory, ScriptedModel};
    use slackagent_protocol::PingStatus;

    fn state() -> AgentState {
        let agent = AgentFactory::new(Arc::new(ScriptedModel::default()))
            .build(Persona::Time)
            .unwrap();
        AgentState::new(Persona::Time, agent, "http://localhost:8080/", "1.0.0")
    }

    #[test]
    fn test_in_flight_guard() {
        let state = state();
        assert_eq!(state.ping().status, PingStatus::Healthy);
        {
            let _a = state.begin_invocation();
            let _b = state.begin_invocation();
            assert_eq!(state.in_flight(), 2);
            assert_eq!(state.ping().status, PingStatus::HealthyBusy);
        }
        assert_eq!(state.in_flight(), 0);
    }

    #[test]
    fn test_card_matches_persona() {
        let state = state();
        assert_eq!(state.card.name, "time");
        assert_eq!(state.ping().agent, "time");
    }
}
