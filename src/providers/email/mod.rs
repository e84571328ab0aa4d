//! Mailbox reader implementations.
//!
//! This module contains the [`SenderReader`] trait and the Gmail API
//! implementation, [`GmailSenderReader`].
//!
//! The categorization pipeline only ever reads from the mailbox: it discovers
//! senders page by page and, for senders the classifier could not place,
//! pulls a few more recent snippets.
//!
//! # Example
//!
//! ```ignore
//! use sortbox::domain::Credential;
//! use sortbox::providers::email::{GmailSenderReader, SenderQuery, SenderReader};
//!
//! async fn list_senders(credential: &Credential) {
//!     let reader = GmailSenderReader::new();
//!     let page = reader
//!         .find_senders(credential, &SenderQuery::with_page_size(100))
//!         .await
//!         .expect("failed to discover senders");
//!
//!     for sender in page.senders.senders() {
//!         println!("{sender}");
//!     }
//! }
//! ```

mod gmail;
mod traits;

pub use gmail::GmailSenderReader;
pub use traits::{ProviderError, Result, SenderPage, SenderQuery, SenderReader};
