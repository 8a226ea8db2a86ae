//! A2A JSON-RPC method names.

/// Return the agent card.
pub const GET_AGENT_CARD: &str = "get_agent_card";

/// Execute a task with the agent.
pub const EXECUTE_TASK: &str = "execute_task";
