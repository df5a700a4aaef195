//! Concrete background jobs.

pub mod job_history_cleanup;
pub mod saved_search_alerts;

pub use job_history_cleanup::JobHistoryCleanupJob;
pub use saved_search_alerts::SavedSearchAlertsJob;
