//! Domain layer types for sender categorization.
//!
//! This module contains the core domain types used throughout the crate:
//! users, categories, sender assignments, classification outcomes, discovery
//! evidence and watermarks.

mod category;
mod classification;
mod sender;
mod types;
mod user;
mod watermark;

pub use category::{
    default_categories, AssignmentTarget, Category, ExistingAssignment, SenderAssignment,
};
pub use classification::{CategoryOutcome, ClassificationResult, SenderEvidence};
pub use sender::{DateRange, SenderMessage, SenderSnippetIndex};
pub use types::{CategoryId, Credential, PageToken, UserId};
pub use user::User;
pub use watermark::{DiscoveryWindow, ScanDirection, Watermark};
