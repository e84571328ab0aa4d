//! Business services layer.
//!
//! This module contains the stages of the sender categorization pipeline
//! and the service that drives them, coordinating between providers,
//! storage, and domain types.
//!
//! # Architecture
//!
//! ```text
//!            CategorizeService
//!                   |
//!   discover -> dedup -> static rules -> batch -> persist -> fallback
//!                   |
//!                   v
//! Infrastructure (SenderReader, LlmProvider, CategoryStore)
//! ```
//!
//! # Services Overview
//!
//! - [`CategorizeService`]: Runs one page of the pipeline for a user
//! - [`AssignmentService`]: Writes assignments and creates categories on demand
//! - [`WatermarkTracker`]: Maintains the categorized time range per user
//! - [`LlmSenderClassifier`]: Prompts an LLM to pick a category for senders

mod assignment_service;
mod batch;
mod categorize_service;
mod classifier;
pub mod dedup;
mod fallback;
pub mod static_rules;
mod watermark_service;

pub use assignment_service::{
    AssignOutcome, AssignmentService, CategoryStore, StoreError, StoreResult,
};
pub use batch::classify_batch;
pub use categorize_service::{
    CategorizeError, CategorizeOutcome, CategorizeRequest, CategorizeService, CredentialError,
    CredentialStore, PipelineStage,
};
pub use classifier::{
    resolve_answer, ClassifierOptions, LlmSenderClassifier, SenderClassifier,
    REQUEST_MORE_INFORMATION, UNKNOWN_SENDER,
};
pub use fallback::{
    FallbackClassifier, FallbackInput, FallbackOptions, FallbackQueue, MAX_FALLBACK_CONCURRENCY,
};
pub use watermark_service::WatermarkTracker;
