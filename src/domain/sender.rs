//! Sender discovery types.
//!
//! A discovery page groups recently observed messages by sender address.
//! These values are classifier evidence only and are never persisted.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SenderEvidence;

/// A single message observed from a sender during discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SenderMessage {
    /// Subject line, if the provider returned one.
    pub subject: Option<String>,
    /// Short preview of the message body.
    pub snippet: String,
    /// Display name from the From header.
    pub from_name: Option<String>,
    /// When the message was received.
    pub date: Option<DateTime<Utc>>,
}

impl SenderMessage {
    /// Creates a message with only a snippet.
    pub fn snippet(snippet: impl Into<String>) -> Self {
        Self {
            subject: None,
            snippet: snippet.into(),
            from_name: None,
            date: None,
        }
    }

    /// Renders the message as a single line of evidence for a classifier.
    pub fn evidence_line(&self, max_chars: usize) -> String {
        let text = match &self.subject {
            Some(subject) if !subject.trim().is_empty() => {
                format!("{} - {}", subject.trim(), self.snippet.trim())
            }
            _ => self.snippet.trim().to_string(),
        };
        truncate_chars(&text, max_chars)
    }
}

/// Inclusive range of message timestamps observed on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Oldest message time.
    pub oldest: DateTime<Utc>,
    /// Newest message time.
    pub newest: DateTime<Utc>,
}

impl DateRange {
    /// Creates a range, swapping the bounds if they arrive reversed.
    pub fn new(a: DateTime<Utc>, b: DateTime<Utc>) -> Self {
        if a <= b {
            Self { oldest: a, newest: b }
        } else {
            Self { oldest: b, newest: a }
        }
    }

    /// Computes the range covering every timestamp, if any.
    pub fn covering(dates: impl IntoIterator<Item = DateTime<Utc>>) -> Option<Self> {
        dates.into_iter().fold(None, |range, date| match range {
            None => Some(Self::new(date, date)),
            Some(r) => Some(Self {
                oldest: r.oldest.min(date),
                newest: r.newest.max(date),
            }),
        })
    }
}

/// Mapping from sender address to the messages observed from that sender.
///
/// Senders keep their discovery order; messages keep provider order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SenderSnippetIndex {
    order: Vec<String>,
    messages: HashMap<String, Vec<SenderMessage>>,
}

impl SenderSnippetIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message for a sender.
    pub fn push(&mut self, sender: impl Into<String>, message: SenderMessage) {
        let sender = sender.into();
        match self.messages.get_mut(&sender) {
            Some(existing) => existing.push(message),
            None => {
                self.order.push(sender.clone());
                self.messages.insert(sender, vec![message]);
            }
        }
    }

    /// Senders in discovery order.
    pub fn senders(&self) -> &[String] {
        &self.order
    }

    /// Messages observed for a sender.
    pub fn messages(&self, sender: &str) -> &[SenderMessage] {
        self.messages.get(sender).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of distinct senders.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no sender was observed.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Builds classifier evidence for a sender from the observed messages.
    pub fn evidence(&self, sender: &str, max_snippets: usize, max_chars: usize) -> SenderEvidence {
        let messages = self.messages(sender);
        let display_name = messages.iter().find_map(|m| m.from_name.clone());
        let snippets = messages
            .iter()
            .map(|m| m.evidence_line(max_chars))
            .filter(|line| !line.is_empty())
            .take(max_snippets)
            .collect();

        SenderEvidence {
            display_name,
            snippets,
            ..SenderEvidence::bare(sender)
        }
    }

    /// Timestamps of every observed message.
    pub fn dates(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        self.messages.values().flatten().filter_map(|m| m.date)
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
