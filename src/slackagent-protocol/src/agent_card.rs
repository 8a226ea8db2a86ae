//! A2A agent card served at `/.well-known/agent-card.json`.

use serde::{Deserialize, Serialize};

/// Protocol name advertised in every card.
pub const A2A_PROTOCOL: &str = "A2A";

/// Protocol version advertised in every card.
pub const A2A_PROTOCOL_VERSION: &str = "0.3.0";

/// Static descriptor advertising an agent's identity, capabilities and skills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    pub name: String,
    pub description: String,
    pub url: String,
    pub version: String,
    pub protocol: String,
    pub protocol_version: String,
    pub authentication: Authentication,
    pub capabilities: AgentCapabilities,
    pub skills: Vec<AgentSkill>,
    pub default_input_modes: Vec<String>,
    pub default_output_modes: Vec<String>,
}

impl AgentCard {
    /// Create a card with text-in/text-out defaults.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        url: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            url: url.into(),
            version: version.into(),
            protocol: A2A_PROTOCOL.to_string(),
            protocol_version: A2A_PROTOCOL_VERSION.to_string(),
            authentication: Authentication::default(),
            capabilities: AgentCapabilities::default(),
            skills: Vec::new(),
            default_input_modes: vec!["text".to_string()],
            default_output_modes: vec!["text".to_string()],
        }
    }

    /// Add a skill.
    pub fn with_skill(mut self, skill: AgentSkill) -> Self {
        self.skills.push(skill);
        self
    }

    /// Set the capabilities.
    pub fn with_capabilities(mut self, capabilities: AgentCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Advertise an extra output mode (e.g. `file`).
    pub fn with_output_mode(mut self, mode: impl Into<String>) -> Self {
        let mode = mode.into();
        if !self.default_output_modes.contains(&mode) {
            self.default_output_modes.push(mode);
        }
        self
    }
}

/// Authentication schemes accepted by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authentication {
    pub schemes: Vec<String>,
}

impl Default for Authentication {
    fn default() -> Self {
        Self {
            schemes: vec!["SigV4".to_string()],
        }
    }
}

/// Optional protocol features.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    pub streaming: bool,
    pub async_processing: bool,
    pub attachments: bool,
}

/// One advertised skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSkill {
    pub id: String,
    pub name: String,
    pub description: String,
    pub input_modes: Vec<String>,
    pub output_modes: Vec<String>,
}

impl AgentSkill {
    /// Create a text-in/text-out skill.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            input_modes: vec!["text".to_string()],
            output_modes: vec!["text".to_string()],
        }
    }

    /// Add an output mode.
    pub fn with_output_mode(mut self, mode: impl Into<String>) -> Self {
        self.output_modes.push(mode.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_serializes_camel_case() {
        let card = AgentCard::new("time-agent", "Tells the time", "http://localhost/", "1.0.0")
            .with_capabilities(AgentCapabilities {
                streaming: false,
                async_processing: true,
                attachments: false,
            })
            .with_skill(AgentSkill::new("current_time", "Current time", "Returns the time"));

        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["protocol"], "A2A");
        assert_eq!(json["protocolVersion"], A2A_PROTOCOL_VERSION);
        assert_eq!(json["capabilities"]["asyncProcessing"], true);
        assert_eq!(json["skills"][0]["inputModes"][0], "text");
        assert_eq!(json["defaultOutputModes"][0], "text");
        assert_eq!(json["authentication"]["schemes"][0], "SigV4");
    }

    #[test]
    fn test_output_mode_not_duplicated() {
        let card = AgentCard::new("a", "b", "c", "d")
            .with_output_mode("file")
            .with_output_mode("file")
            .with_output_mode("text");
        assert_eq!(card.default_output_modes, vec!["text", "file"]);
    }
}
