//! Per-user categorization watermark tracking.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::assignment_service::{CategoryStore, StoreResult};
use crate::domain::{UserId, Watermark};

/// Reads and widens the stored watermark.
pub struct WatermarkTracker<S: CategoryStore> {
    store: Arc<S>,
}

impl<S: CategoryStore> WatermarkTracker<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The stored watermark for `user_id`.
    pub async fn current(&self, user_id: &UserId) -> StoreResult<Watermark> {
        self.store.get_watermark(user_id).await
    }

    /// Merges observed bounds into the stored watermark and returns the result.
    ///
    /// When both bounds are `None` nothing is written.
    pub async fn extend(
        &self,
        user_id: &UserId,
        observed_oldest: Option<DateTime<Utc>>,
        observed_newest: Option<DateTime<Utc>>,
    ) -> StoreResult<Watermark> {
        let stored = self.store.get_watermark(user_id).await?;
        let mut merged = stored;
        merged.extend(observed_oldest, observed_newest);

        if merged != stored {
            self.store.save_watermark(user_id, &merged).await?;
            tracing::debug!(
                user_id = %user_id,
                oldest = ?merged.oldest,
                newest = ?merged.newest,
                "watermark extended"
            );
        }

        Ok(merged)
    }
}
