//! Sender categorization orchestrator.
//!
//! One invocation processes one discovery page for one user:
//!
//! ```text
//! start -> discover -> dedup -> static-classify -> batch-ai-classify
//!       -> persist-batch-results -> fallback-classify
//!       -> persist-fallback-results -> update-watermark -> done
//! ```
//!
//! Results are committed as each stage produces them, so an interrupted run
//! keeps its progress and the next run skips what was already stored.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use thiserror::Error;

use super::assignment_service::{AssignmentService, CategoryStore, StoreError};
use super::batch;
use super::classifier::SenderClassifier;
use super::dedup;
use super::fallback::{FallbackClassifier, FallbackOptions, FallbackQueue};
use super::static_rules;
use super::watermark_service::WatermarkTracker;
use crate::config::PipelineSettings;
use crate::domain::{
    Category, CategoryOutcome, ClassificationResult, Credential, DateRange, DiscoveryWindow,
    PageToken, ScanDirection, SenderEvidence, User, UserId,
};
use crate::providers::email::{ProviderError, SenderQuery, SenderReader};

/// Errors that abort a categorization run.
#[derive(Debug, Error)]
pub enum CategorizeError {
    /// The user or their mailbox credential is unavailable.
    #[error("access denied: {0}")]
    Access(String),

    /// The user cannot be categorized as configured.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Mailbox provider failure during discovery.
    #[error("provider error: {0}")]
    Provider(ProviderError),

    /// Persistence failure.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Failure reading a credential.
#[derive(Debug, Error)]
#[error("credential lookup failed: {0}")]
pub struct CredentialError(pub String);

/// Source of mailbox access tokens.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// The user's mailbox credential, if one is stored.
    async fn mailbox_credential(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Credential>, CredentialError>;
}

/// Parameters for one run.
#[derive(Debug, Clone)]
pub struct CategorizeRequest {
    /// User to categorize for.
    pub user_id: UserId,
    /// Continuation token from the previous run.
    pub page_token: Option<PageToken>,
    /// Optional time bounds for discovery.
    pub window: DiscoveryWindow,
}

impl CategorizeRequest {
    /// First page for `user_id` with no time bounds.
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            page_token: None,
            window: DiscoveryWindow::unbounded(),
        }
    }

    /// Continues from a token returned by an earlier run.
    ///
    /// The window must match the one that run used; see
    /// [`CategorizeOutcome::window`].
    pub fn page_token(mut self, token: Option<PageToken>) -> Self {
        self.page_token = token;
        self
    }

    /// Restricts discovery to a time window.
    pub fn window(mut self, window: DiscoveryWindow) -> Self {
        self.window = window;
        self
    }
}

/// Summary of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategorizeOutcome {
    /// Senders newly assigned to a real category.
    pub categorized_count: usize,
    /// Token for the next page; `None` when discovery is exhausted.
    pub next_page_token: Option<PageToken>,
    /// Categories created during this run.
    pub created_categories: Vec<String>,
    /// Senders that went through the fallback pass.
    pub fallback_attempted: usize,
    /// Senders left without any outcome.
    pub unresolved: Vec<String>,
    /// Window discovery ran with; pass it back alongside the page token.
    pub window: DiscoveryWindow,
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Preconditions are being checked.
    Start,
    /// Reading one page of senders from the mailbox.
    Discover,
    /// Dropping senders that already have a category.
    Dedup,
    /// Applying address and display-name rules.
    StaticClassify,
    /// One classifier round-trip for the ambiguous senders.
    BatchAiClassify,
    /// Writing resolved static and batch results.
    PersistBatchResults,
    /// Classifying leftover senders one at a time.
    FallbackClassify,
    /// Writing fallback results as they complete.
    PersistFallbackResults,
    /// Widening the stored watermark.
    UpdateWatermark,
    /// Run finished.
    Done,
}

impl PipelineStage {
    /// Stage name as it appears in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Discover => "discover",
            Self::Dedup => "dedup",
            Self::StaticClassify => "static-classify",
            Self::BatchAiClassify => "batch-ai-classify",
            Self::PersistBatchResults => "persist-batch-results",
            Self::FallbackClassify => "fallback-classify",
            Self::PersistFallbackResults => "persist-fallback-results",
            Self::UpdateWatermark => "update-watermark",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn enter(user_id: &UserId, stage: PipelineStage) {
    tracing::debug!(user_id = %user_id, stage = %stage, "pipeline stage");
}

/// Runs the categorization pipeline.
pub struct CategorizeService<S, R, C, K>
where
    S: CategoryStore,
    R: SenderReader,
    C: SenderClassifier,
    K: CredentialStore,
{
    store: Arc<S>,
    reader: R,
    classifier: C,
    credentials: K,
    settings: PipelineSettings,
    assignments: AssignmentService<S>,
    watermarks: WatermarkTracker<S>,
}

/// Per-run bookkeeping for persisted results.
#[derive(Default)]
struct RunTally {
    categorized: usize,
    created_categories: Vec<String>,
}

impl<S, R, C, K> CategorizeService<S, R, C, K>
where
    S: CategoryStore,
    R: SenderReader,
    C: SenderClassifier,
    K: CredentialStore,
{
    /// Creates a new categorization service.
    pub fn new(
        store: Arc<S>,
        reader: R,
        classifier: C,
        credentials: K,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            assignments: AssignmentService::new(store.clone()),
            watermarks: WatermarkTracker::new(store.clone()),
            store,
            reader,
            classifier,
            credentials,
            settings,
        }
    }

    /// Watermark tracker sharing this service's store.
    pub fn watermarks(&self) -> &WatermarkTracker<S> {
        &self.watermarks
    }

    /// Builds a token-less request that starts past the stored watermark.
    ///
    /// Mail already covered by earlier runs is left out of the window, so a
    /// fresh run in [`ScanDirection::Older`] continues further back in
    /// history and one in [`ScanDirection::Newer`] only sees new arrivals.
    pub async fn fresh_request(
        &self,
        user_id: impl Into<UserId>,
        direction: ScanDirection,
    ) -> Result<CategorizeRequest, CategorizeError> {
        let user_id = user_id.into();
        let watermark = self.watermarks.current(&user_id).await?;
        let window = DiscoveryWindow::beyond(&watermark, direction);
        tracing::debug!(
            user_id = %user_id,
            direction = ?direction,
            after = ?window.after,
            before = ?window.before,
            "resuming past watermark"
        );
        Ok(CategorizeRequest::new(user_id).window(window))
    }

    /// Categorizes the senders on one discovery page.
    ///
    /// # Errors
    ///
    /// - [`CategorizeError::Access`] if the user or credential is missing, or
    ///   the provider rejects the credential. Nothing is read or written.
    /// - [`CategorizeError::Configuration`] if the user has no categories.
    /// - [`CategorizeError::Provider`] for other discovery failures.
    /// - [`CategorizeError::Storage`] for persistence failures; results
    ///   committed before the failure are kept.
    pub async fn categorize_senders(
        &self,
        request: CategorizeRequest,
    ) -> Result<CategorizeOutcome, CategorizeError> {
        let user_id = &request.user_id;
        enter(user_id, PipelineStage::Start);

        let (user, credential, categories) = self.check_preconditions(user_id).await?;

        enter(user_id, PipelineStage::Discover);
        let query = SenderQuery::with_page_size(self.settings.page_size)
            .page_token(request.page_token.clone())
            .window(request.window);
        let page = self
            .reader
            .find_senders(&credential, &query)
            .await
            .map_err(|e| match e {
                ProviderError::Authentication(reason) => CategorizeError::Access(reason),
                other => CategorizeError::Provider(other),
            })?;

        tracing::info!(
            user_id = %user_id,
            senders = page.senders.len(),
            has_next = page.next_page_token.is_some(),
            "senders discovered"
        );

        if page.senders.is_empty() {
            self.update_watermark(user_id, &page.date_range).await?;
            enter(user_id, PipelineStage::Done);
            return Ok(CategorizeOutcome {
                next_page_token: page.next_page_token,
                window: request.window,
                ..Default::default()
            });
        }

        enter(user_id, PipelineStage::Dedup);
        let existing = self
            .store
            .find_assignments(page.senders.senders(), user_id)
            .await?;
        let partition = dedup::partition(page.senders.senders(), &existing);
        tracing::debug!(
            user_id = %user_id,
            new = partition.new.len(),
            already_categorized = partition.already_categorized.len(),
            stored_unresolved = partition.needs_fallback.len(),
            "senders deduplicated"
        );

        let evidence_for = |sender: &str| {
            page.senders.evidence(
                sender,
                self.settings.batch_snippets_per_sender,
                self.settings.snippet_max_chars,
            )
        };
        let evidence: Vec<SenderEvidence> =
            partition.new.iter().map(|s| evidence_for(s.as_str())).collect();

        enter(user_id, PipelineStage::StaticClassify);
        let mut results = static_rules::classify_all(&evidence);

        enter(user_id, PipelineStage::BatchAiClassify);
        let batch_input: Vec<SenderEvidence> = evidence
            .iter()
            .zip(&results)
            .filter(|(_, r)| matches!(r.outcome, None | Some(CategoryOutcome::Deferred)))
            .map(|(e, _)| e.clone())
            .collect();
        let batch_results =
            batch::classify_batch(&self.classifier, &user, &batch_input, &categories).await;
        merge_batch_results(&mut results, batch_results);

        enter(user_id, PipelineStage::PersistBatchResults);
        let mut tally = RunTally::default();
        for result in &results {
            if let Some(outcome @ CategoryOutcome::Resolved(_)) = &result.outcome {
                self.persist(&result.sender, outcome, user_id, &mut tally)
                    .await?;
            }
        }

        enter(user_id, PipelineStage::FallbackClassify);
        let mut queue = FallbackQueue::new();
        for (result, evidence) in results.iter().zip(evidence) {
            if result.needs_fallback() {
                queue.push(evidence, result.outcome.clone());
            }
        }
        for stored in partition.needs_fallback {
            queue.push(evidence_for(stored.sender.as_str()), stored.outcome);
        }
        let fallback_attempted = queue.len();

        let options = FallbackOptions {
            snippet_limit: self.settings.fallback_snippet_limit,
            snippet_max_chars: self.settings.snippet_max_chars,
            concurrency: self.settings.fallback_concurrency,
        };
        let fallback = FallbackClassifier::new(
            &self.reader,
            &self.classifier,
            &credential,
            &user,
            &categories,
            options,
        );
        let stream = fallback.classify(queue.into_inputs());
        futures::pin_mut!(stream);

        enter(user_id, PipelineStage::PersistFallbackResults);
        let mut unresolved = Vec::new();
        while let Some(result) = stream.next().await {
            match &result.outcome {
                Some(outcome) => {
                    self.persist(&result.sender, outcome, user_id, &mut tally)
                        .await?
                }
                None => unresolved.push(result.sender),
            }
        }

        enter(user_id, PipelineStage::UpdateWatermark);
        self.update_watermark(user_id, &page.date_range).await?;

        enter(user_id, PipelineStage::Done);
        tracing::info!(
            user_id = %user_id,
            categorized = tally.categorized,
            fallback_attempted,
            unresolved = unresolved.len(),
            "categorization run complete"
        );

        Ok(CategorizeOutcome {
            categorized_count: tally.categorized,
            next_page_token: page.next_page_token,
            created_categories: tally.created_categories,
            fallback_attempted,
            unresolved,
            window: request.window,
        })
    }

    async fn check_preconditions(
        &self,
        user_id: &UserId,
    ) -> Result<(User, Credential, Vec<Category>), CategorizeError> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| CategorizeError::Access(format!("unknown user {}", user_id)))?;

        let credential = self
            .credentials
            .mailbox_credential(user_id)
            .await
            .map_err(|e| CategorizeError::Access(e.to_string()))?
            .ok_or_else(|| {
                CategorizeError::Access(format!("no mailbox credential for user {}", user_id))
            })?;

        let categories = self.store.list_categories(user_id).await?;
        if categories.is_empty() {
            return Err(CategorizeError::Configuration(format!(
                "user {} has no categories",
                user_id
            )));
        }

        Ok((user, credential, categories))
    }

    async fn persist(
        &self,
        sender: &str,
        outcome: &CategoryOutcome,
        user_id: &UserId,
        tally: &mut RunTally,
    ) -> Result<(), StoreError> {
        let assigned = self.assignments.assign(sender, outcome, user_id).await?;
        if let CategoryOutcome::Resolved(name) = outcome {
            tally.categorized += 1;
            if assigned.created_category {
                tally.created_categories.push(name.clone());
            }
        }
        Ok(())
    }

    async fn update_watermark(
        &self,
        user_id: &UserId,
        range: &Option<DateRange>,
    ) -> Result<(), StoreError> {
        if let Some(range) = range {
            self.watermarks
                .extend(user_id, Some(range.oldest), Some(range.newest))
                .await?;
        }
        Ok(())
    }
}

/// Overlays batch answers on the static results.
///
/// A batch answer replaces the static one; an unresolved batch answer keeps
/// whatever the static rules said.
fn merge_batch_results(results: &mut [ClassificationResult], batch: Vec<ClassificationResult>) {
    let answers: HashMap<String, CategoryOutcome> = batch
        .into_iter()
        .filter_map(|r| r.outcome.map(|o| (r.sender, o)))
        .collect();

    for result in results.iter_mut() {
        if let Some(outcome) = answers.get(&result.sender) {
            result.outcome = Some(outcome.clone());
        }
    }
}
