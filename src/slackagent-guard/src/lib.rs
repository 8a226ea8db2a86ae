//! Text heuristics applied to user prompts and model replies.
//!
//! Everything in this crate is a pure function of its input: no I/O, no
//! shared mutable state, safe to call from any number of threads.
//!
//! - [`surface`] decides whether a reply deserves a Canvas or a plain message
//! - [`validation`] gate-keeps inbound prompts before they reach a model
//! - [`sanitize`] strips Slack markup and control characters from prompts

pub mod sanitize;
pub mod surface;
pub mod validation;

pub use sanitize::{sanitize_prompt, strip_mentions};
pub use surface::{FormattingReport, ReplySurface, analyze, route_reply, use_rich_surface};
pub use validation::{DEFAULT_BLOCKED_PHRASES, DEFAULT_MAX_PROMPT_LENGTH, PromptValidator, ValidationOutcome};
