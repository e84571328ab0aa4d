//! sortbox - Resumable, AI-assisted email sender categorization
//!
//! This crate discovers the senders in a user's mailbox, sorts them into the
//! user's categories using static rules and an LLM, and remembers what it
//! has already done so repeated runs only pay for new senders.

pub mod config;
pub mod domain;
pub mod providers;
pub mod services;
pub mod storage;
