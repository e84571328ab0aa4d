//! Classification outcomes.
//!
//! Sentinel results ("unknown", "needs more information") are variants of
//! [`CategoryOutcome`] rather than reserved category names, so a user
//! category that happens to be called "Unknown" is just another category.

use serde::{Deserialize, Serialize};

/// What a classifier concluded about a sender.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "category", rename_all = "snake_case")]
pub enum CategoryOutcome {
    /// Sender belongs to the named category.
    Resolved(String),
    /// Classification deferred; the sender could be anyone.
    Deferred,
    /// The classifier needs more message history to decide.
    InsufficientEvidence,
}

impl CategoryOutcome {
    /// Creates a resolved outcome.
    pub fn resolved(name: impl Into<String>) -> Self {
        Self::Resolved(name.into())
    }

    /// Whether this outcome is a sentinel rather than a real category.
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, Self::Resolved(_))
    }
}

/// Result of classifying one sender. `outcome: None` means unresolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Sender address.
    pub sender: String,
    /// Classification outcome, if any.
    pub outcome: Option<CategoryOutcome>,
}

impl ClassificationResult {
    /// Creates a result.
    pub fn new(sender: impl Into<String>, outcome: Option<CategoryOutcome>) -> Self {
        Self {
            sender: sender.into(),
            outcome,
        }
    }

    /// Creates an unresolved result.
    pub fn unresolved(sender: impl Into<String>) -> Self {
        Self::new(sender, None)
    }

    /// Whether the result still needs the fallback pass.
    pub fn needs_fallback(&self) -> bool {
        self.outcome.as_ref().map_or(true, CategoryOutcome::is_sentinel)
    }
}

/// Evidence about one sender handed to a classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderEvidence {
    /// Sender address.
    pub sender: String,
    /// Display name seen on the sender's messages.
    pub display_name: Option<String>,
    /// Message snippets, most relevant first.
    pub snippets: Vec<String>,
}

impl SenderEvidence {
    /// Evidence with no snippets.
    pub fn bare(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            display_name: None,
            snippets: Vec::new(),
        }
    }

    /// Appends snippets not already present.
    pub fn merge_snippets(&mut self, snippets: impl IntoIterator<Item = String>) {
        for snippet in snippets {
            if !snippet.is_empty() && !self.snippets.contains(&snippet) {
                self.snippets.push(snippet);
            }
        }
    }
}
