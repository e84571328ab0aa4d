//! Mailbox reader trait definition.
//!
//! This module defines the [`SenderReader`] trait, the read-only view of a
//! mailbox the categorization pipeline consumes. Implementations discover
//! distinct senders page by page and fetch a few recent snippets for a
//! single sender on demand.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{
    Credential, DateRange, DiscoveryWindow, PageToken, SenderMessage, SenderSnippetIndex,
};

/// Result type alias for mailbox provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors that can occur during mailbox provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Authentication failed or credentials expired.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Network or connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        /// Seconds to wait before retrying, if known.
        retry_after_secs: Option<u64>,
    },

    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid request or parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Parameters for one page of sender discovery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SenderQuery {
    /// Maximum number of messages to scan for this page.
    pub page_size: u32,
    /// Cursor returned by the previous page.
    pub page_token: Option<PageToken>,
    /// Time bounds for the scan.
    pub window: DiscoveryWindow,
}

impl SenderQuery {
    /// Creates a first-page query with the given size.
    pub fn with_page_size(page_size: u32) -> Self {
        Self {
            page_size,
            ..Default::default()
        }
    }

    /// Continues from a previous page.
    pub fn page_token(mut self, token: Option<PageToken>) -> Self {
        self.page_token = token;
        self
    }

    /// Restricts the scan to a time window.
    pub fn window(mut self, window: DiscoveryWindow) -> Self {
        self.window = window;
        self
    }
}

/// One page of discovered senders.
#[derive(Debug, Clone, Default)]
pub struct SenderPage {
    /// Senders and the messages observed from them.
    pub senders: SenderSnippetIndex,
    /// Cursor for the next page; `None` when the window is exhausted.
    pub next_page_token: Option<PageToken>,
    /// Range of message times seen on this page.
    pub date_range: Option<DateRange>,
}

/// Read-only access to a user's mailbox.
///
/// # Example
///
/// ```ignore
/// use sortbox::providers::email::{SenderQuery, SenderReader};
///
/// async fn first_page(reader: &impl SenderReader, credential: &Credential) -> Result<()> {
///     let page = reader
///         .find_senders(credential, &SenderQuery::with_page_size(100))
///         .await?;
///
///     for sender in page.senders.senders() {
///         println!("{sender}");
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SenderReader: Send + Sync {
    /// Discovers distinct senders in one page of the mailbox.
    ///
    /// An empty sender set is a valid result, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Authentication`] if the credential is invalid or expired.
    async fn find_senders(&self, credential: &Credential, query: &SenderQuery)
        -> Result<SenderPage>;

    /// Fetches up to `limit` recent messages from one sender.
    async fn recent_snippets(
        &self,
        credential: &Credential,
        sender: &str,
        limit: u32,
    ) -> Result<Vec<SenderMessage>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_builder() {
        let query = SenderQuery::with_page_size(25).page_token(Some(PageToken::new("next")));
        assert_eq!(query.page_size, 25);
        assert_eq!(query.page_token.as_ref().map(PageToken::as_str), Some("next"));
        assert_eq!(query.window, DiscoveryWindow::unbounded());
    }

    #[test]
    fn query_serialization() {
        let query = SenderQuery::with_page_size(50);
        let json = serde_json::to_string(&query).unwrap();
        let deserialized: SenderQuery = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.page_size, 50);
        assert!(deserialized.page_token.is_none());
    }

    #[test]
    fn provider_error_display() {
        let auth_err = ProviderError::Authentication("token expired".to_string());
        assert_eq!(auth_err.to_string(), "authentication failed: token expired");

        let rate_err = ProviderError::RateLimited {
            retry_after_secs: Some(60),
        };
        assert!(rate_err.to_string().contains("rate limit"));
    }

    #[test]
    fn empty_page_is_terminal() {
        let page = SenderPage::default();
        assert!(page.senders.is_empty());
        assert!(page.next_page_token.is_none());
        assert!(page.date_range.is_none());
    }
}
