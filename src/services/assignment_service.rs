//! Category and sender assignment persistence.
//!
//! Writes are idempotent per (sender, user). Categories are created lazily
//! the first time a resolved classification names one the user does not
//! have yet.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    default_categories, AssignmentTarget, Category, CategoryOutcome, ExistingAssignment,
    SenderAssignment, User, UserId, Watermark,
};

/// Errors reported by a [`CategoryStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Referenced row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence seam for users, categories, assignments and watermarks.
#[async_trait]
pub trait CategoryStore: Send + Sync {
    /// Gets a user by id.
    async fn get_user(&self, user_id: &UserId) -> StoreResult<Option<User>>;

    /// Lists the user's categories by name.
    async fn list_categories(&self, user_id: &UserId) -> StoreResult<Vec<Category>>;

    /// Gets a category by exact name.
    async fn get_category_by_name(
        &self,
        user_id: &UserId,
        name: &str,
    ) -> StoreResult<Option<Category>>;

    /// Inserts a category.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the user already has a category
    /// with the same name.
    async fn insert_category(&self, category: &Category) -> StoreResult<()>;

    /// Reads stored assignments for exactly these senders.
    async fn find_assignments(
        &self,
        senders: &[String],
        user_id: &UserId,
    ) -> StoreResult<Vec<ExistingAssignment>>;

    /// Inserts or replaces the assignment for (sender, user).
    async fn upsert_assignment(
        &self,
        sender: &str,
        user_id: &UserId,
        target: &AssignmentTarget,
    ) -> StoreResult<SenderAssignment>;

    /// Reads the user's watermark; empty when none is stored.
    async fn get_watermark(&self, user_id: &UserId) -> StoreResult<Watermark>;

    /// Stores the user's watermark.
    async fn save_watermark(&self, user_id: &UserId, watermark: &Watermark) -> StoreResult<()>;
}

/// Result of [`AssignmentService::assign`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignOutcome {
    /// Whether the category was created by this call.
    pub created_category: bool,
    /// The stored assignment.
    pub assignment: SenderAssignment,
}

/// Service for writing sender assignments.
pub struct AssignmentService<S: CategoryStore> {
    store: Arc<S>,
}

impl<S: CategoryStore> AssignmentService<S> {
    /// Creates a new assignment service.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Assigns `sender` to the outcome for `user_id`.
    ///
    /// Resolved outcomes point at the named category, creating it first if
    /// needed. Sentinels are stored without touching the catalog.
    pub async fn assign(
        &self,
        sender: &str,
        outcome: &CategoryOutcome,
        user_id: &UserId,
    ) -> StoreResult<AssignOutcome> {
        let (target, created_category) = match outcome {
            CategoryOutcome::Resolved(name) => {
                let (category, created) = self.get_or_create_category(user_id, name).await?;
                (AssignmentTarget::Category(category.id), created)
            }
            CategoryOutcome::Deferred => (AssignmentTarget::Deferred, false),
            CategoryOutcome::InsufficientEvidence => {
                (AssignmentTarget::InsufficientEvidence, false)
            }
        };

        let assignment = self
            .store
            .upsert_assignment(sender, user_id, &target)
            .await?;

        tracing::debug!(
            user_id = %user_id,
            sender = %sender,
            outcome = target.outcome_str(),
            "sender assigned"
        );

        Ok(AssignOutcome {
            created_category,
            assignment,
        })
    }

    /// Looks a category up by name, creating it when absent.
    ///
    /// A concurrent writer creating the same name first is not an error:
    /// the existing row is read back and returned.
    pub async fn get_or_create_category(
        &self,
        user_id: &UserId,
        name: &str,
    ) -> StoreResult<(Category, bool)> {
        if let Some(existing) = self.store.get_category_by_name(user_id, name).await? {
            return Ok((existing, false));
        }

        let category = Category::new(user_id.clone(), name, None);
        match self.store.insert_category(&category).await {
            Ok(()) => {
                tracing::info!(user_id = %user_id, category = %name, "category created");
                Ok((category, true))
            }
            Err(StoreError::Conflict(reason)) => {
                tracing::debug!(
                    user_id = %user_id,
                    category = %name,
                    reason = %reason,
                    "category created concurrently; reusing"
                );
                let existing = self
                    .store
                    .get_category_by_name(user_id, name)
                    .await?
                    .ok_or_else(|| {
                        StoreError::NotFound(format!("category {} vanished after conflict", name))
                    })?;
                Ok((existing, false))
            }
            Err(e) => Err(e),
        }
    }

    /// Creates any default category the user is missing.
    ///
    /// Returns the names that were created.
    pub async fn seed_default_categories(&self, user_id: &UserId) -> StoreResult<Vec<String>> {
        let mut created = Vec::new();
        for (name, description) in default_categories::ALL {
            if self
                .store
                .get_category_by_name(user_id, name)
                .await?
                .is_some()
            {
                continue;
            }

            let category = Category::new(user_id.clone(), *name, Some(description.to_string()));
            match self.store.insert_category(&category).await {
                Ok(()) => created.push(name.to_string()),
                Err(StoreError::Conflict(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(created)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// In-memory store used by the service tests.
    #[derive(Default)]
    pub(crate) struct MockStore {
        pub users: Mutex<Vec<User>>,
        pub categories: Mutex<Vec<Category>>,
        pub assignments: Mutex<Vec<SenderAssignment>>,
        pub watermarks: Mutex<Vec<(UserId, Watermark)>>,
        /// Category inserted by a "concurrent writer" right before our insert.
        pub race_on_insert: Mutex<Option<Category>>,
        pub insert_attempts: Mutex<usize>,
    }

    impl MockStore {
        pub fn with_user(user: User, categories: &[&str]) -> Self {
            let store = Self::default();
            for name in categories {
                store
                    .categories
                    .lock()
                    .unwrap()
                    .push(Category::new(user.id.clone(), *name, None));
            }
            store.users.lock().unwrap().push(user);
            store
        }

        pub fn category_names(&self) -> Vec<String> {
            self.categories
                .lock()
                .unwrap()
                .iter()
                .map(|c| c.name.clone())
                .collect()
        }

        pub fn target_of(&self, sender: &str) -> Option<AssignmentTarget> {
            self.assignments
                .lock()
                .unwrap()
                .iter()
                .find(|a| a.sender == sender)
                .map(|a| a.target.clone())
        }
    }

    #[async_trait]
    impl CategoryStore for MockStore {
        async fn get_user(&self, user_id: &UserId) -> StoreResult<Option<User>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| &u.id == user_id)
                .cloned())
        }

        async fn list_categories(&self, user_id: &UserId) -> StoreResult<Vec<Category>> {
            Ok(self
                .categories
                .lock()
                .unwrap()
                .iter()
                .filter(|c| &c.user_id == user_id)
                .cloned()
                .collect())
        }

        async fn get_category_by_name(
            &self,
            user_id: &UserId,
            name: &str,
        ) -> StoreResult<Option<Category>> {
            Ok(self
                .categories
                .lock()
                .unwrap()
                .iter()
                .find(|c| &c.user_id == user_id && c.name == name)
                .cloned())
        }

        async fn insert_category(&self, category: &Category) -> StoreResult<()> {
            *self.insert_attempts.lock().unwrap() += 1;
            let mut categories = self.categories.lock().unwrap();
            if let Some(winner) = self.race_on_insert.lock().unwrap().take() {
                categories.push(winner);
            }
            if categories
                .iter()
                .any(|c| c.user_id == category.user_id && c.name == category.name)
            {
                return Err(StoreError::Conflict(category.name.clone()));
            }
            categories.push(category.clone());
            Ok(())
        }

        async fn find_assignments(
            &self,
            senders: &[String],
            user_id: &UserId,
        ) -> StoreResult<Vec<ExistingAssignment>> {
            let categories = self.categories.lock().unwrap();
            Ok(self
                .assignments
                .lock()
                .unwrap()
                .iter()
                .filter(|a| &a.user_id == user_id && senders.contains(&a.sender))
                .map(|a| ExistingAssignment {
                    sender: a.sender.clone(),
                    outcome: match &a.target {
                        AssignmentTarget::Category(id) => categories
                            .iter()
                            .find(|c| &c.id == id)
                            .map(|c| CategoryOutcome::resolved(&c.name)),
                        AssignmentTarget::Deferred => Some(CategoryOutcome::Deferred),
                        AssignmentTarget::InsufficientEvidence => {
                            Some(CategoryOutcome::InsufficientEvidence)
                        }
                    },
                })
                .collect())
        }

        async fn upsert_assignment(
            &self,
            sender: &str,
            user_id: &UserId,
            target: &AssignmentTarget,
        ) -> StoreResult<SenderAssignment> {
            let assignment = SenderAssignment {
                sender: sender.to_string(),
                user_id: user_id.clone(),
                target: target.clone(),
                updated_at: Utc::now(),
            };
            let mut assignments = self.assignments.lock().unwrap();
            assignments.retain(|a| !(a.sender == sender && &a.user_id == user_id));
            assignments.push(assignment.clone());
            Ok(assignment)
        }

        async fn get_watermark(&self, user_id: &UserId) -> StoreResult<Watermark> {
            Ok(self
                .watermarks
                .lock()
                .unwrap()
                .iter()
                .find(|(id, _)| id == user_id)
                .map(|(_, w)| *w)
                .unwrap_or_default())
        }

        async fn save_watermark(&self, user_id: &UserId, watermark: &Watermark) -> StoreResult<()> {
            let mut watermarks = self.watermarks.lock().unwrap();
            watermarks.retain(|(id, _)| id != user_id);
            watermarks.push((user_id.clone(), *watermark));
            Ok(())
        }
    }

    fn setup(categories: &[&str]) -> (Arc<MockStore>, AssignmentService<MockStore>, UserId) {
        let user = User::new("user-1", "me@example.com");
        let id = user.id.clone();
        let store = Arc::new(MockStore::with_user(user, categories));
        let service = AssignmentService::new(store.clone());
        (store, service, id)
    }

    #[tokio::test]
    async fn assign_existing_category() {
        let (store, service, user_id) = setup(&["Receipt"]);

        let outcome = service
            .assign("shop@store.example", &CategoryOutcome::resolved("Receipt"), &user_id)
            .await
            .unwrap();

        assert!(!outcome.created_category);
        assert_eq!(store.category_names(), vec!["Receipt"]);
        assert!(matches!(
            store.target_of("shop@store.example"),
            Some(AssignmentTarget::Category(_))
        ));
    }

    #[tokio::test]
    async fn assign_creates_missing_category() {
        let (store, service, user_id) = setup(&["Receipt"]);

        let outcome = service
            .assign("dev@tool.example", &CategoryOutcome::resolved("Tools"), &user_id)
            .await
            .unwrap();

        assert!(outcome.created_category);
        assert_eq!(store.category_names(), vec!["Receipt", "Tools"]);
    }

    #[tokio::test]
    async fn assign_is_idempotent() {
        let (store, service, user_id) = setup(&[]);
        let outcome = CategoryOutcome::resolved("Receipt");

        let first = service
            .assign("shop@store.example", &outcome, &user_id)
            .await
            .unwrap();
        let second = service
            .assign("shop@store.example", &outcome, &user_id)
            .await
            .unwrap();

        assert!(first.created_category);
        assert!(!second.created_category);
        assert_eq!(first.assignment.target, second.assignment.target);
        assert_eq!(store.category_names(), vec!["Receipt"]);
        assert_eq!(store.assignments.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sentinels_never_create_categories() {
        let (store, service, user_id) = setup(&["Personal"]);

        service
            .assign("a@gmail.com", &CategoryOutcome::Deferred, &user_id)
            .await
            .unwrap();
        service
            .assign("b@gmail.com", &CategoryOutcome::InsufficientEvidence, &user_id)
            .await
            .unwrap();

        assert_eq!(store.category_names(), vec!["Personal"]);
        assert_eq!(store.target_of("a@gmail.com"), Some(AssignmentTarget::Deferred));
        assert_eq!(
            store.target_of("b@gmail.com"),
            Some(AssignmentTarget::InsufficientEvidence)
        );
        assert_eq!(*store.insert_attempts.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn conflict_reuses_concurrently_created_category() {
        let (store, service, user_id) = setup(&[]);
        let winner = Category::new(user_id.clone(), "Receipt", None);
        *store.race_on_insert.lock().unwrap() = Some(winner.clone());

        let outcome = service
            .assign("shop@store.example", &CategoryOutcome::resolved("Receipt"), &user_id)
            .await
            .unwrap();

        assert!(!outcome.created_category);
        assert_eq!(
            outcome.assignment.target,
            AssignmentTarget::Category(winner.id)
        );
        assert_eq!(store.category_names(), vec!["Receipt"]);
    }

    #[tokio::test]
    async fn reassignment_replaces_sentinel() {
        let (store, service, user_id) = setup(&["Personal"]);

        service
            .assign("a@gmail.com", &CategoryOutcome::Deferred, &user_id)
            .await
            .unwrap();
        service
            .assign("a@gmail.com", &CategoryOutcome::resolved("Personal"), &user_id)
            .await
            .unwrap();

        assert_eq!(store.assignments.lock().unwrap().len(), 1);
        assert!(matches!(
            store.target_of("a@gmail.com"),
            Some(AssignmentTarget::Category(_))
        ));
    }

    #[tokio::test]
    async fn seed_defaults_fills_gaps_once() {
        let (store, service, user_id) = setup(&["Receipt"]);

        let created = service.seed_default_categories(&user_id).await.unwrap();
        assert_eq!(
            created,
            vec!["Newsletter", "Personal", "Marketing", "Notification"]
        );

        let again = service.seed_default_categories(&user_id).await.unwrap();
        assert!(again.is_empty());
        assert_eq!(store.category_names().len(), default_categories::ALL.len());
    }
}
