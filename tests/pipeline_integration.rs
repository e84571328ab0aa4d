//! Integration tests for the categorization pipeline.
//!
//! These tests run [`CategorizeService`] against the real SQLite store with
//! a scripted mailbox and classifier, checking what ends up persisted across
//! repeated runs. Each service module contains its own unit tests for the
//! individual stages.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;

use sortbox::config::PipelineSettings;
use sortbox::domain::{
    Category, CategoryOutcome, ClassificationResult, Credential, DateRange, DiscoveryWindow,
    PageToken, ScanDirection, SenderEvidence, SenderMessage, SenderSnippetIndex, User, UserId,
    Watermark,
};
use sortbox::providers::ai::{LlmError, LlmResult};
use sortbox::providers::email::{self, SenderPage, SenderQuery, SenderReader};
use sortbox::services::{
    CategorizeError, CategorizeRequest, CategorizeService, CategoryStore, CredentialError,
    CredentialStore, SenderClassifier,
};
use sortbox::storage::{Database, SqliteCategoryStore};

// ============================================================================
// Test doubles
// ============================================================================

/// Mailbox that always serves the same page and records each query.
struct FixedMailbox {
    page: SenderPage,
    history: HashMap<String, Vec<SenderMessage>>,
    queries: Arc<Mutex<Vec<SenderQuery>>>,
}

#[async_trait]
impl SenderReader for FixedMailbox {
    async fn find_senders(
        &self,
        _credential: &Credential,
        query: &SenderQuery,
    ) -> email::Result<SenderPage> {
        self.queries.lock().unwrap().push(query.clone());
        Ok(self.page.clone())
    }

    async fn recent_snippets(
        &self,
        _credential: &Credential,
        sender: &str,
        limit: u32,
    ) -> email::Result<Vec<SenderMessage>> {
        let history = self.history.get(sender).cloned().unwrap_or_default();
        Ok(history.into_iter().take(limit as usize).collect())
    }
}

/// Classifier answering from fixed tables and recording every call.
#[derive(Default)]
struct ScriptedClassifier {
    batch: HashMap<String, CategoryOutcome>,
    single: HashMap<String, CategoryOutcome>,
    batch_calls: Arc<Mutex<Vec<Vec<String>>>>,
    single_calls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl SenderClassifier for ScriptedClassifier {
    async fn classify_batch(
        &self,
        _user: &User,
        senders: &[SenderEvidence],
        _categories: &[Category],
    ) -> LlmResult<Vec<ClassificationResult>> {
        self.batch_calls
            .lock()
            .unwrap()
            .push(senders.iter().map(|s| s.sender.clone()).collect());
        Ok(senders
            .iter()
            .map(|s| ClassificationResult::new(&s.sender, self.batch.get(&s.sender).cloned()))
            .collect())
    }

    async fn classify_single(
        &self,
        _user: &User,
        sender: &SenderEvidence,
        _categories: &[Category],
    ) -> LlmResult<Option<CategoryOutcome>> {
        self.single_calls.lock().unwrap().push(sender.sender.clone());
        if sender.snippets.is_empty() {
            return Err(LlmError::InvalidResponse("no evidence".to_string()));
        }
        Ok(self.single.get(&sender.sender).cloned())
    }
}

struct StaticCredentials;

#[async_trait]
impl CredentialStore for StaticCredentials {
    async fn mailbox_credential(
        &self,
        _user_id: &UserId,
    ) -> Result<Option<Credential>, CredentialError> {
        Ok(Some(Credential::new("test-token")))
    }
}

type Service =
    CategorizeService<SqliteCategoryStore, FixedMailbox, ScriptedClassifier, StaticCredentials>;

// ============================================================================
// Fixtures
// ============================================================================

fn message(snippet: &str, day: u32) -> SenderMessage {
    SenderMessage {
        subject: None,
        snippet: snippet.to_string(),
        from_name: None,
        date: Some(Utc.with_ymd_and_hms(2024, 4, day, 9, 0, 0).unwrap()),
    }
}

fn mailbox(history: HashMap<String, Vec<SenderMessage>>) -> FixedMailbox {
    let mut index = SenderSnippetIndex::new();
    index.push("a@gmail.com", message("hey, long time", 3));
    index.push("newsletter@list.example", message("This week in gardening", 5));
    index.push("receipts@store.example", message("Your order #1234", 9));

    let date_range = DateRange::covering(index.dates());
    FixedMailbox {
        page: SenderPage {
            senders: index,
            next_page_token: Some(PageToken::new("page-2")),
            date_range,
        },
        history,
        queries: Arc::default(),
    }
}

async fn seeded_store() -> Arc<SqliteCategoryStore> {
    let store = SqliteCategoryStore::new(Database::open_in_memory().await.unwrap());
    store
        .create_user(&User::new("user-1", "me@example.com"))
        .await
        .unwrap();
    for name in ["Newsletter", "Receipt", "Personal"] {
        store
            .insert_category(&Category::new(UserId::from("user-1"), name, None))
            .await
            .unwrap();
    }
    Arc::new(store)
}

fn service(
    store: Arc<SqliteCategoryStore>,
    reader: FixedMailbox,
    classifier: ScriptedClassifier,
) -> Service {
    CategorizeService::new(
        store,
        reader,
        classifier,
        StaticCredentials,
        PipelineSettings::default(),
    )
}

fn all_senders() -> Vec<String> {
    [
        "a@gmail.com",
        "newsletter@list.example",
        "receipts@store.example",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn insufficient_for_gmail() -> ScriptedClassifier {
    ScriptedClassifier {
        batch: HashMap::from([(
            "a@gmail.com".to_string(),
            CategoryOutcome::InsufficientEvidence,
        )]),
        ..Default::default()
    }
}

// ============================================================================
// Pipeline Tests
// ============================================================================

#[tokio::test]
async fn static_rules_keep_ai_calls_to_the_ambiguous_sender() {
    let store = seeded_store().await;
    let history = HashMap::from([(
        "a@gmail.com".to_string(),
        vec![message("dinner friday?", 1), message("photos attached", 2)],
    )]);
    let svc = service(store.clone(), mailbox(history), insufficient_for_gmail());

    let outcome = svc
        .categorize_senders(CategorizeRequest::new("user-1"))
        .await
        .unwrap();

    assert_eq!(outcome.categorized_count, 2);
    assert_eq!(outcome.next_page_token, Some(PageToken::new("page-2")));
    assert_eq!(outcome.unresolved, vec!["a@gmail.com".to_string()]);
    assert!(outcome.created_categories.is_empty());

    let stored = store
        .find_assignments(&all_senders(), &UserId::from("user-1"))
        .await
        .unwrap();
    let by_sender: HashMap<_, _> = stored
        .into_iter()
        .map(|a| (a.sender, a.outcome))
        .collect();

    assert_eq!(by_sender.len(), 2);
    assert_eq!(
        by_sender["newsletter@list.example"],
        Some(CategoryOutcome::resolved("Newsletter"))
    );
    assert_eq!(
        by_sender["receipts@store.example"],
        Some(CategoryOutcome::resolved("Receipt"))
    );
    assert!(!by_sender.contains_key("a@gmail.com"));
}

#[tokio::test]
async fn only_deferred_sender_reaches_batch_and_fallback() {
    let store = seeded_store().await;
    let classifier = insufficient_for_gmail();
    let batch_calls = classifier.batch_calls.clone();
    let single_calls = classifier.single_calls.clone();
    let history = HashMap::from([("a@gmail.com".to_string(), vec![message("hi", 1)])]);
    let svc = service(store, mailbox(history), classifier);

    let outcome = svc
        .categorize_senders(CategorizeRequest::new("user-1"))
        .await
        .unwrap();

    assert_eq!(
        *batch_calls.lock().unwrap(),
        vec![vec!["a@gmail.com".to_string()]]
    );
    assert_eq!(*single_calls.lock().unwrap(), vec!["a@gmail.com".to_string()]);
    assert_eq!(outcome.fallback_attempted, 1);
}

#[tokio::test]
async fn fallback_resolution_is_persisted() {
    let store = seeded_store().await;
    let history = HashMap::from([("a@gmail.com".to_string(), vec![message("dinner?", 1)])]);
    let classifier = ScriptedClassifier {
        batch: HashMap::from([(
            "a@gmail.com".to_string(),
            CategoryOutcome::InsufficientEvidence,
        )]),
        single: HashMap::from([(
            "a@gmail.com".to_string(),
            CategoryOutcome::resolved("Personal"),
        )]),
        ..Default::default()
    };
    let svc = service(store.clone(), mailbox(history), classifier);

    let outcome = svc
        .categorize_senders(CategorizeRequest::new("user-1"))
        .await
        .unwrap();

    assert_eq!(outcome.categorized_count, 3);
    assert!(outcome.unresolved.is_empty());

    let stored = store
        .find_assignments(&["a@gmail.com".to_string()], &UserId::from("user-1"))
        .await
        .unwrap();
    assert_eq!(stored[0].outcome, Some(CategoryOutcome::resolved("Personal")));
}

#[tokio::test]
async fn repeated_runs_do_not_duplicate_categories() {
    let store = seeded_store().await;
    let classifier = ScriptedClassifier {
        batch: HashMap::from([(
            "a@gmail.com".to_string(),
            CategoryOutcome::resolved("Friends"),
        )]),
        ..Default::default()
    };
    let svc = service(store.clone(), mailbox(HashMap::new()), classifier);

    let first = svc
        .categorize_senders(CategorizeRequest::new("user-1"))
        .await
        .unwrap();
    let second = svc
        .categorize_senders(
            CategorizeRequest::new("user-1").page_token(first.next_page_token.clone()),
        )
        .await
        .unwrap();

    assert_eq!(first.categorized_count, 3);
    assert_eq!(first.created_categories, vec!["Friends".to_string()]);
    assert_eq!(second.categorized_count, 0);
    assert!(second.created_categories.is_empty());

    let names: Vec<String> = store
        .list_categories(&UserId::from("user-1"))
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["Friends", "Newsletter", "Personal", "Receipt"]);
}

#[tokio::test]
async fn second_run_skips_categorized_senders() {
    let store = seeded_store().await;
    let classifier = insufficient_for_gmail();
    let batch_calls = classifier.batch_calls.clone();
    let svc = service(store, mailbox(HashMap::new()), classifier);

    svc.categorize_senders(CategorizeRequest::new("user-1"))
        .await
        .unwrap();
    let second = svc
        .categorize_senders(CategorizeRequest::new("user-1"))
        .await
        .unwrap();

    // Only the unresolved sender is looked at again.
    assert_eq!(second.categorized_count, 0);
    assert_eq!(second.fallback_attempted, 1);
    assert_eq!(second.unresolved, vec!["a@gmail.com".to_string()]);
    assert_eq!(
        batch_calls.lock().unwrap().last(),
        Some(&vec!["a@gmail.com".to_string()])
    );
}

#[tokio::test]
async fn watermark_covers_processed_page() {
    let store = seeded_store().await;
    let svc = service(store.clone(), mailbox(HashMap::new()), insufficient_for_gmail());

    svc.categorize_senders(CategorizeRequest::new("user-1"))
        .await
        .unwrap();

    let watermark = store.get_watermark(&UserId::from("user-1")).await.unwrap();
    assert_eq!(
        watermark,
        Watermark {
            oldest: Some(Utc.with_ymd_and_hms(2024, 4, 3, 9, 0, 0).unwrap()),
            newest: Some(Utc.with_ymd_and_hms(2024, 4, 9, 9, 0, 0).unwrap()),
        }
    );
}

#[tokio::test]
async fn unknown_user_is_rejected_before_discovery() {
    let store = Arc::new(SqliteCategoryStore::new(
        Database::open_in_memory().await.unwrap(),
    ));
    let svc = service(store, mailbox(HashMap::new()), ScriptedClassifier::default());

    let err = svc
        .categorize_senders(CategorizeRequest::new("ghost"))
        .await
        .unwrap_err();

    assert!(matches!(err, CategorizeError::Access(_)));
}

#[tokio::test]
async fn second_fresh_run_queries_past_covered_range() {
    let store = seeded_store().await;
    let mailbox = mailbox(HashMap::new());
    let queries = mailbox.queries.clone();
    let svc = service(store, mailbox, insufficient_for_gmail());

    for _ in 0..2 {
        let request = svc
            .fresh_request("user-1", ScanDirection::Older)
            .await
            .unwrap();
        svc.categorize_senders(request).await.unwrap();
    }

    let queries = queries.lock().unwrap();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[0].window, DiscoveryWindow::unbounded());
    assert_eq!(
        queries[1].window.before,
        Some(Utc.with_ymd_and_hms(2024, 4, 3, 9, 0, 0).unwrap())
    );
    assert!(queries[1].page_token.is_none());
}
