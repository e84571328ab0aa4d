//! Category and sender assignment types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CategoryId, CategoryOutcome, UserId};

/// A user-defined category senders are grouped into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Unique identifier for this category.
    pub id: CategoryId,
    /// User that owns this category.
    pub user_id: UserId,
    /// Display name, unique within the user's catalog.
    pub name: String,
    /// Optional description shown to the classifier.
    pub description: Option<String>,
}

impl Category {
    /// Creates a category with a freshly generated id.
    pub fn new(user_id: UserId, name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: CategoryId::generate(),
            user_id,
            name: name.into(),
            description,
        }
    }
}

/// Default catalog offered to new users.
pub mod default_categories {
    /// Name/description pairs for the default catalog.
    pub const ALL: &[(&str, &str)] = &[
        ("Newsletter", "Newsletters, digests and mailing lists"),
        ("Receipt", "Receipts, invoices, order and payment confirmations"),
        ("Personal", "People the user corresponds with directly"),
        ("Marketing", "Promotions, offers and product announcements"),
        ("Notification", "Automated account and service notifications"),
    ];
}

/// Where a sender assignment points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "category_id", rename_all = "snake_case")]
pub enum AssignmentTarget {
    /// A real category.
    Category(CategoryId),
    /// Deferred sentinel.
    Deferred,
    /// Needs-more-information sentinel.
    InsufficientEvidence,
}

impl AssignmentTarget {
    /// Database representation of the outcome column.
    pub fn outcome_str(&self) -> &'static str {
        match self {
            Self::Category(_) => "resolved",
            Self::Deferred => "deferred",
            Self::InsufficientEvidence => "insufficient_evidence",
        }
    }

    /// Category id for real categories.
    pub fn category_id(&self) -> Option<&CategoryId> {
        match self {
            Self::Category(id) => Some(id),
            Self::Deferred | Self::InsufficientEvidence => None,
        }
    }
}

/// The persisted (sender, user) -> category relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderAssignment {
    /// Sender address.
    pub sender: String,
    /// User the assignment belongs to.
    pub user_id: UserId,
    /// Assigned category or sentinel.
    pub target: AssignmentTarget,
    /// When the assignment was last written.
    pub updated_at: DateTime<Utc>,
}

/// An assignment as read back for deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingAssignment {
    /// Sender address.
    pub sender: String,
    /// Stored outcome; `None` when the assigned category no longer exists.
    pub outcome: Option<CategoryOutcome>,
}
