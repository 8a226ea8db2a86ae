//! Slack integration for the agents.
//!
//! This crate covers the three ways the system touches Slack:
//! - Events API payloads arriving at the ingress ([`events`])
//! - Request signature verification for those payloads ([`signature`])
//! - Web API calls made by the ingress, the verification agent and the
//!   poster ([`api`]), behind the [`SlackApi`] trait
//!
//! Every Web API call takes the bot token explicitly because each
//! workspace installation has its own token.

pub mod api;
pub mod error;
pub mod events;
pub mod fake;
pub mod mrkdwn;
pub mod signature;

pub use api::{FileUpload, SlackApi, SlackClient, SlackClientOptions, ThreadMessage};
pub use error::{SlackApiError, SlackError, SlackResult};
pub use events::{EventCallback, EventEnvelope, InboundMessage, SlackEvent};
pub use fake::{RecordedCall, RecordingSlack};
pub use mrkdwn::{markdown_to_mrkdwn, split_message};
pub use signature::{compute_signature, verify_signature};

/// Reaction marking a message as being worked on.
pub const REACTION_PROCESSING: &str = "eyes";

/// Reaction marking a message as answered.
pub const REACTION_DONE: &str = "white_check_mark";
