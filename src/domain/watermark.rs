//! Categorization watermark and discovery window types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message-time bounds already covered by categorization for a user.
///
/// The range only ever widens: merging an observed range can move `oldest`
/// earlier and `newest` later, never the other way around.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    /// Oldest categorized message time.
    pub oldest: Option<DateTime<Utc>>,
    /// Newest categorized message time.
    pub newest: Option<DateTime<Utc>>,
}

impl Watermark {
    /// Merges observed bounds into this watermark.
    pub fn extend(
        &mut self,
        observed_oldest: Option<DateTime<Utc>>,
        observed_newest: Option<DateTime<Utc>>,
    ) {
        if let Some(observed) = observed_oldest {
            self.oldest = Some(self.oldest.map_or(observed, |stored| stored.min(observed)));
        }
        if let Some(observed) = observed_newest {
            self.newest = Some(self.newest.map_or(observed, |stored| stored.max(observed)));
        }
    }

    /// Whether nothing has been categorized yet.
    pub fn is_empty(&self) -> bool {
        self.oldest.is_none() && self.newest.is_none()
    }
}

/// Time bounds for a discovery request. Both ends are exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryWindow {
    /// Only messages received after this time.
    pub after: Option<DateTime<Utc>>,
    /// Only messages received before this time.
    pub before: Option<DateTime<Utc>>,
}

impl DiscoveryWindow {
    /// No bounds.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// History older than anything already categorized.
    pub fn older_than(watermark: &Watermark) -> Self {
        Self {
            after: None,
            before: watermark.oldest,
        }
    }

    /// Mail newer than anything already categorized.
    pub fn newer_than(watermark: &Watermark) -> Self {
        Self {
            after: watermark.newest,
            before: None,
        }
    }

    /// The uncovered side of `watermark` in the given direction.
    pub fn beyond(watermark: &Watermark, direction: ScanDirection) -> Self {
        match direction {
            ScanDirection::Older => Self::older_than(watermark),
            ScanDirection::Newer => Self::newer_than(watermark),
        }
    }
}

/// Which side of the categorized range a fresh run scans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanDirection {
    /// Walk back through history.
    #[default]
    Older,
    /// Pick up mail that arrived since the last run.
    Newer,
}
