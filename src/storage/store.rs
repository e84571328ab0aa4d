//! SQLite-backed [`CategoryStore`].

use async_trait::async_trait;
use chrono::Utc;

use super::database::{Database, DatabaseError};
use super::queries;
use crate::domain::{
    AssignmentTarget, Category, ExistingAssignment, SenderAssignment, User, UserId, Watermark,
};
use crate::services::{CategoryStore, StoreError, StoreResult};

impl From<DatabaseError> for StoreError {
    fn from(err: DatabaseError) -> Self {
        if err.is_constraint_violation() {
            StoreError::Conflict(err.to_string())
        } else {
            StoreError::Database(err.to_string())
        }
    }
}

/// Category store persisting to the local SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteCategoryStore {
    db: Database,
}

impl SqliteCategoryStore {
    /// Creates a store over an open database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Registers a user.
    pub async fn create_user(&self, user: &User) -> StoreResult<()> {
        let user = user.clone();
        self.db
            .with_conn(move |conn| Ok(queries::users::insert(conn, &user)?))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CategoryStore for SqliteCategoryStore {
    async fn get_user(&self, user_id: &UserId) -> StoreResult<Option<User>> {
        let user_id = user_id.clone();
        Ok(self
            .db
            .with_conn(move |conn| Ok(queries::users::get_by_id(conn, &user_id)?))
            .await?)
    }

    async fn list_categories(&self, user_id: &UserId) -> StoreResult<Vec<Category>> {
        let user_id = user_id.clone();
        Ok(self
            .db
            .with_conn(move |conn| Ok(queries::categories::list_by_user(conn, &user_id)?))
            .await?)
    }

    async fn get_category_by_name(
        &self,
        user_id: &UserId,
        name: &str,
    ) -> StoreResult<Option<Category>> {
        let user_id = user_id.clone();
        let name = name.to_string();
        Ok(self
            .db
            .with_conn(move |conn| Ok(queries::categories::get_by_name(conn, &user_id, &name)?))
            .await?)
    }

    async fn insert_category(&self, category: &Category) -> StoreResult<()> {
        let category = category.clone();
        Ok(self
            .db
            .with_conn(move |conn| Ok(queries::categories::insert(conn, &category)?))
            .await?)
    }

    async fn find_assignments(
        &self,
        senders: &[String],
        user_id: &UserId,
    ) -> StoreResult<Vec<ExistingAssignment>> {
        let senders = senders.to_vec();
        let user_id = user_id.clone();
        Ok(self
            .db
            .with_conn(move |conn| {
                Ok(queries::assignments::find_for_senders(
                    conn, &senders, &user_id,
                )?)
            })
            .await?)
    }

    async fn upsert_assignment(
        &self,
        sender: &str,
        user_id: &UserId,
        target: &AssignmentTarget,
    ) -> StoreResult<SenderAssignment> {
        let sender = sender.to_string();
        let user_id = user_id.clone();
        let target = target.clone();
        let now = Utc::now();
        Ok(self
            .db
            .with_conn(move |conn| {
                Ok(queries::assignments::upsert(
                    conn, &sender, &user_id, &target, now,
                )?)
            })
            .await?)
    }

    async fn get_watermark(&self, user_id: &UserId) -> StoreResult<Watermark> {
        let user_id = user_id.clone();
        let stored = self
            .db
            .with_conn(move |conn| Ok(queries::watermarks::get(conn, &user_id)?))
            .await?;
        Ok(stored.unwrap_or_default())
    }

    async fn save_watermark(&self, user_id: &UserId, watermark: &Watermark) -> StoreResult<()> {
        let user_id = user_id.clone();
        let watermark = *watermark;
        Ok(self
            .db
            .with_conn(move |conn| Ok(queries::watermarks::save(conn, &user_id, &watermark)?))
            .await?)
    }
}
