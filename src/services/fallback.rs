//! Per-sender fallback classification for senders still unresolved.
//!
//! Each sender is re-classified on its own, after pulling a few recent
//! messages from the mailbox when the evidence in hand is thin. Senders run
//! through a bounded pool and results stream out as each one finishes, so
//! the caller can persist them incrementally.

use std::collections::HashSet;

use futures::stream::{self, Stream, StreamExt};

use super::classifier::SenderClassifier;
use crate::domain::{
    Category, CategoryOutcome, ClassificationResult, Credential, SenderEvidence, User,
};
use crate::providers::email::SenderReader;

/// Upper bound on concurrent fallback classifications.
pub const MAX_FALLBACK_CONCURRENCY: usize = 5;

/// One sender queued for the fallback pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackInput {
    /// Evidence collected so far.
    pub evidence: SenderEvidence,
    /// Outcome from earlier stages or storage, if any.
    pub current: Option<CategoryOutcome>,
}

impl FallbackInput {
    fn needs_history(&self) -> bool {
        self.evidence.snippets.is_empty()
            || self.current == Some(CategoryOutcome::InsufficientEvidence)
    }
}

/// Fallback inputs keyed by sender; a sender is queued at most once.
#[derive(Debug, Default)]
pub struct FallbackQueue {
    inputs: Vec<FallbackInput>,
    seen: HashSet<String>,
}

impl FallbackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a sender. Returns `false` if it was already queued.
    pub fn push(&mut self, evidence: SenderEvidence, current: Option<CategoryOutcome>) -> bool {
        if !self.seen.insert(evidence.sender.clone()) {
            return false;
        }
        self.inputs.push(FallbackInput { evidence, current });
        true
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn into_inputs(self) -> Vec<FallbackInput> {
        self.inputs
    }
}

/// Tuning for the fallback pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackOptions {
    /// Recent messages to fetch per sender.
    pub snippet_limit: u32,
    /// Maximum characters per evidence line.
    pub snippet_max_chars: usize,
    /// Requested worker count; clamped to `1..=MAX_FALLBACK_CONCURRENCY`.
    pub concurrency: usize,
}

impl FallbackOptions {
    /// Effective worker count.
    pub fn workers(&self) -> usize {
        self.concurrency.clamp(1, MAX_FALLBACK_CONCURRENCY)
    }
}

impl Default for FallbackOptions {
    fn default() -> Self {
        Self {
            snippet_limit: 3,
            snippet_max_chars: 300,
            concurrency: 1,
        }
    }
}

/// Runs the fallback pass for one user.
pub struct FallbackClassifier<'a, R: ?Sized, C: ?Sized> {
    reader: &'a R,
    classifier: &'a C,
    credential: &'a Credential,
    user: &'a User,
    categories: &'a [Category],
    options: FallbackOptions,
}

impl<'a, R, C> FallbackClassifier<'a, R, C>
where
    R: SenderReader + ?Sized,
    C: SenderClassifier + ?Sized,
{
    pub fn new(
        reader: &'a R,
        classifier: &'a C,
        credential: &'a Credential,
        user: &'a User,
        categories: &'a [Category],
        options: FallbackOptions,
    ) -> Self {
        Self {
            reader,
            classifier,
            credential,
            user,
            categories,
            options,
        }
    }

    /// Classifies every input, yielding results in completion order.
    ///
    /// Every input yields exactly one result. Failures are logged and
    /// surface as unresolved results.
    pub fn classify(
        &'a self,
        inputs: Vec<FallbackInput>,
    ) -> impl Stream<Item = ClassificationResult> + 'a {
        stream::iter(inputs)
            .map(move |input| self.classify_one(input))
            .buffer_unordered(self.options.workers())
    }

    async fn classify_one(&self, mut input: FallbackInput) -> ClassificationResult {
        let sender = input.evidence.sender.clone();

        if input.needs_history() {
            match self
                .reader
                .recent_snippets(self.credential, &sender, self.options.snippet_limit)
                .await
            {
                Ok(messages) => {
                    if input.evidence.display_name.is_none() {
                        input.evidence.display_name =
                            messages.iter().find_map(|m| m.from_name.clone());
                    }
                    input.evidence.merge_snippets(
                        messages
                            .iter()
                            .map(|m| m.evidence_line(self.options.snippet_max_chars)),
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        user_id = %self.user.id,
                        sender = %sender,
                        error = %e,
                        "could not fetch sender history for fallback"
                    );
                    return ClassificationResult::unresolved(sender);
                }
            }
        }

        match self
            .classifier
            .classify_single(self.user, &input.evidence, self.categories)
            .await
        {
            Ok(outcome) => {
                tracing::debug!(
                    user_id = %self.user.id,
                    sender = %sender,
                    resolved = outcome.is_some(),
                    snippets = input.evidence.snippets.len(),
                    "fallback classification complete"
                );
                ClassificationResult::new(sender, outcome)
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %self.user.id,
                    sender = %sender,
                    error = %e,
                    "fallback classification failed"
                );
                ClassificationResult::unresolved(sender)
            }
        }
    }
}
