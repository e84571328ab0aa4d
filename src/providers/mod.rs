//! External service providers.
//!
//! - [`email`] - Read-only mailbox access (Gmail API)
//! - [`ai`] - LLM chat completions (OpenAI-compatible endpoints)

pub mod ai;
pub mod email;
