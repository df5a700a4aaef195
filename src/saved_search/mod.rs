//! Saved searches and their notification watermark.

mod models;

pub use models::{
    non_empty_list, non_empty_text, FilterFields, NewSavedSearch, SavedSearch,
    DEFAULT_SEARCH_NAME,
};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Criteria storage as seen by the alert engine.
///
/// The engine only reads active searches and advances watermarks; every other
/// mutation belongs to the owning user.
#[async_trait]
pub trait CriteriaStore: Send + Sync {
    /// Every saved search with `is_active = true`.
    async fn list_active(&self) -> Result<Vec<SavedSearch>>;

    /// Advances `last_notified_at` for a search.
    ///
    /// Implementations must never move an existing watermark backwards; a request for
    /// an older timestamp leaves the stored value untouched and still succeeds.
    async fn set_last_notified(&self, search_id: &str, notified_at: DateTime<Utc>) -> Result<()>;
}
