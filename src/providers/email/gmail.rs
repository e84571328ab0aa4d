//! Gmail API sender reader.
//!
//! This module provides a [`SenderReader`] implementation on top of the Gmail
//! REST API. It only reads: it lists received messages, fetches their
//! `From`/`Subject` metadata and groups them by sender address.
//!
//! # API Usage
//!
//! - `users.messages.list` with a search query for discovery and per-sender history
//! - `users.messages.get` with `format=metadata` for headers and snippets

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use mailparse::MailAddr;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;

use super::{ProviderError, Result, SenderPage, SenderQuery, SenderReader};
use crate::domain::{
    Credential, DateRange, DiscoveryWindow, PageToken, SenderMessage, SenderSnippetIndex,
};

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Metadata requests in flight per discovery page.
const METADATA_CONCURRENCY: usize = 8;

/// Gmail API message list response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageListResponse {
    messages: Option<Vec<MessageRef>>,
    next_page_token: Option<String>,
}

/// Gmail API message reference (list entries only carry ids).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageRef {
    id: String,
}

/// Gmail API message in metadata format.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessage {
    snippet: Option<String>,
    payload: Option<GmailMessagePayload>,
    internal_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GmailMessagePayload {
    headers: Option<Vec<GmailHeader>>,
}

#[derive(Debug, Deserialize)]
struct GmailHeader {
    name: String,
    value: String,
}

impl GmailMessage {
    fn header(&self, name: &str) -> Option<&str> {
        self.payload
            .as_ref()?
            .headers
            .as_ref()?
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    fn date(&self) -> Option<DateTime<Utc>> {
        self.internal_date
            .as_ref()
            .and_then(|d| d.parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis)
    }

    /// Splits the message into its normalized sender and observed message.
    fn into_sender_message(self) -> Option<(String, SenderMessage)> {
        let (address, from_name) = parse_from(self.header("From")?)?;
        let message = SenderMessage {
            subject: self.header("Subject").map(str::to_string),
            snippet: self.snippet.clone().unwrap_or_default(),
            from_name,
            date: self.date(),
        };
        Some((address, message))
    }
}

/// Parses a `From` header into a lower-case address and optional display name.
fn parse_from(value: &str) -> Option<(String, Option<String>)> {
    let parsed = mailparse::addrparse(value).ok().and_then(|list| {
        list.iter().find_map(|addr| match addr {
            MailAddr::Single(info) => Some((info.addr.clone(), info.display_name.clone())),
            MailAddr::Group(group) => group
                .addrs
                .first()
                .map(|info| (info.addr.clone(), info.display_name.clone())),
        })
    });

    let (address, name) = match parsed {
        Some(found) => found,
        None => (value.trim().to_string(), None),
    };

    let address = address.trim().to_lowercase();
    if address.is_empty() {
        return None;
    }
    let name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    Some((address, name))
}

/// Builds the Gmail search query for a discovery window.
fn discovery_query(window: &DiscoveryWindow) -> String {
    let mut parts = vec!["-in:sent".to_string()];
    if let Some(after) = window.after {
        parts.push(format!("after:{}", after.timestamp()));
    }
    if let Some(before) = window.before {
        parts.push(format!("before:{}", before.timestamp()));
    }
    parts.join(" ")
}

/// Groups fetched messages into a sender page.
fn build_page(messages: Vec<GmailMessage>, next_page_token: Option<String>) -> SenderPage {
    let mut senders = SenderSnippetIndex::new();
    for message in messages {
        if let Some((address, observed)) = message.into_sender_message() {
            senders.push(address, observed);
        }
    }

    let date_range = DateRange::covering(senders.dates());

    SenderPage {
        senders,
        next_page_token: next_page_token.filter(|t| !t.is_empty()).map(PageToken::new),
        date_range,
    }
}

/// Gmail-backed [`SenderReader`].
pub struct GmailSenderReader {
    client: reqwest::Client,
    base_url: String,
}

impl GmailSenderReader {
    /// Creates a reader against the public Gmail API.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: GMAIL_API_BASE.to_string(),
        }
    }

    /// Overrides the API base URL (useful for proxies and test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn auth_headers(credential: &Credential) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", credential.token()))
                .map_err(|e| ProviderError::Authentication(format!("invalid token: {}", e)))?,
        );
        Ok(headers)
    }

    /// Makes an authenticated GET request to the Gmail API.
    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        credential: &Credential,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);

        let response = self
            .client
            .get(&url)
            .headers(Self::auth_headers(credential)?)
            .query(query)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Internal(format!("parse response: {}", e)))
    }

    /// Maps API error responses onto provider errors.
    async fn handle_error(response: reqwest::Response) -> ProviderError {
        let status = response.status();
        let retry_after_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let body = response.text().await.unwrap_or_default();

        match status.as_u16() {
            401 | 403 => ProviderError::Authentication(format!("unauthorized: {}", body)),
            404 => ProviderError::NotFound(body),
            429 => ProviderError::RateLimited { retry_after_secs },
            400 => ProviderError::InvalidRequest(body),
            _ => ProviderError::Internal(format!("API error ({}): {}", status, body)),
        }
    }

    async fn list_messages(
        &self,
        credential: &Credential,
        q: String,
        max_results: u32,
        page_token: Option<&PageToken>,
    ) -> Result<MessageListResponse> {
        let mut query = vec![("q", q), ("maxResults", max_results.to_string())];
        if let Some(token) = page_token {
            query.push(("pageToken", token.as_str().to_string()));
        }
        self.get(credential, "/messages", &query).await
    }

    async fn fetch_metadata(&self, credential: &Credential, id: &str) -> Result<GmailMessage> {
        let query = [
            ("format", "metadata".to_string()),
            ("metadataHeaders", "From".to_string()),
            ("metadataHeaders", "Subject".to_string()),
        ];
        self.get(credential, &format!("/messages/{}", id), &query)
            .await
    }

    async fn fetch_all_metadata(
        &self,
        credential: &Credential,
        refs: Vec<MessageRef>,
    ) -> Result<Vec<GmailMessage>> {
        let fetched: Vec<(String, Result<GmailMessage>)> = stream::iter(refs)
            .map(|message_ref| async move {
                let result = self.fetch_metadata(credential, &message_ref.id).await;
                (message_ref.id, result)
            })
            .buffered(METADATA_CONCURRENCY)
            .collect()
            .await;

        let mut messages = Vec::with_capacity(fetched.len());
        for (id, result) in fetched {
            match result {
                Ok(message) => messages.push(message),
                // Deleted between list and get.
                Err(ProviderError::NotFound(_)) => {
                    tracing::debug!(message_id = %id, "message vanished during discovery");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(messages)
    }
}

impl Default for GmailSenderReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SenderReader for GmailSenderReader {
    async fn find_senders(
        &self,
        credential: &Credential,
        query: &SenderQuery,
    ) -> Result<SenderPage> {
        if query.page_size == 0 {
            return Err(ProviderError::InvalidRequest(
                "page size must be positive".to_string(),
            ));
        }

        let list = self
            .list_messages(
                credential,
                discovery_query(&query.window),
                query.page_size,
                query.page_token.as_ref(),
            )
            .await?;

        let refs = list.messages.unwrap_or_default();
        let message_count = refs.len();
        let messages = self.fetch_all_metadata(credential, refs).await?;
        let page = build_page(messages, list.next_page_token);

        tracing::debug!(
            messages = message_count,
            senders = page.senders.len(),
            has_next = page.next_page_token.is_some(),
            "Gmail discovery page fetched"
        );

        Ok(page)
    }

    async fn recent_snippets(
        &self,
        credential: &Credential,
        sender: &str,
        limit: u32,
    ) -> Result<Vec<SenderMessage>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let list = self
            .list_messages(credential, format!("from:{}", sender), limit, None)
            .await?;
        let messages = self
            .fetch_all_metadata(credential, list.messages.unwrap_or_default())
            .await?;

        Ok(messages
            .into_iter()
            .filter_map(GmailMessage::into_sender_message)
            .map(|(_, message)| message)
            .collect())
    }
}
