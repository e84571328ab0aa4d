//! Database and credential storage.
//!
//! This module provides the storage layer for sortbox, including:
//!
//! - SQLite database for users, categories, assignments, and watermarks
//! - OS keychain integration for mailbox tokens and API keys
//! - Async-safe database operations via tokio::task::spawn_blocking

mod database;
mod keychain;
pub mod queries;
mod schema;
mod store;

pub use database::{Database, DatabaseError, Result};
pub use keychain::{KeychainAccess, KeychainError};
pub use store::SqliteCategoryStore;

/// Combined storage layer with database and keychain access.
///
/// This is the main entry point for storage operations.
#[derive(Debug, Clone)]
pub struct StorageLayer {
    db: Database,
    keychain: KeychainAccess,
}

impl StorageLayer {
    /// Creates a new storage layer with the given database path and
    /// keychain service.
    pub async fn new(
        db_path: impl AsRef<std::path::Path>,
        keychain_service: Option<&str>,
    ) -> Result<Self> {
        let db = Database::open(db_path).await?;
        let keychain = keychain_service
            .map(KeychainAccess::with_service)
            .unwrap_or_default();

        Ok(Self { db, keychain })
    }

    /// Creates a storage layer with an in-memory database for testing.
    pub async fn in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        let keychain = KeychainAccess::with_service("sortbox.test");

        Ok(Self { db, keychain })
    }

    /// Returns a reference to the database.
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Returns a reference to the keychain.
    pub fn keychain(&self) -> &KeychainAccess {
        &self.keychain
    }

    /// Builds a category store sharing this layer's connection.
    pub fn category_store(&self) -> SqliteCategoryStore {
        SqliteCategoryStore::new(self.db.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{User, UserId};
    use crate::services::CategoryStore;

    #[tokio::test]
    async fn storage_layer_in_memory() {
        let storage = StorageLayer::in_memory().await.unwrap();

        let count: i64 = storage
            .db()
            .with_conn(|conn| {
                let count =
                    conn.query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
            .unwrap();

        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn storage_layer_keychain_service() {
        let storage = StorageLayer::in_memory().await.unwrap();
        assert_eq!(storage.keychain().service_name(), "sortbox.test");
    }

    #[tokio::test]
    async fn category_store_shares_connection() {
        let storage = StorageLayer::in_memory().await.unwrap();
        let store = storage.category_store();
        store
            .create_user(&User::new("user-1", "me@example.com"))
            .await
            .unwrap();

        let count: i64 = storage
            .db()
            .with_conn(|conn| {
                let count = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert!(store.get_user(&UserId::from("user-1")).await.unwrap().is_some());
    }
}
