//! User domain type.

use serde::{Deserialize, Serialize};

use super::UserId;

/// The owner of a mailbox being categorized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    pub id: UserId,
    /// The user's own email address.
    pub email: String,
    /// Free-text context the user wrote about themselves.
    pub about: Option<String>,
}

impl User {
    /// Creates a user without an about text.
    pub fn new(id: impl Into<UserId>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            about: None,
        }
    }

    /// Sets the about text.
    pub fn with_about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }
}
