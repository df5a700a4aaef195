mod models;
mod run_lease;
mod schema;
mod sqlite_server_store;

pub use models::*;
pub use run_lease::ServerStoreLease;
pub use schema::SERVER_VERSIONED_SCHEMAS;
pub use sqlite_server_store::SqliteServerStore;

use anyhow::Result;
use std::time::Duration;

pub trait ServerStore: Send + Sync {
    // Job runs
    fn record_job_start(&self, job_id: &str, triggered_by: &str) -> Result<i64>;
    fn record_job_finish(
        &self,
        run_id: i64,
        status: JobRunStatus,
        error_message: Option<String>,
    ) -> Result<()>;
    fn get_running_jobs(&self) -> Result<Vec<JobRun>>;
    fn get_job_history(&self, job_id: &str, limit: usize) -> Result<Vec<JobRun>>;
    fn mark_stale_jobs_failed(&self) -> Result<usize>;
    /// Deletes finished runs older than `before_ms`. Running entries are kept.
    fn cleanup_old_job_runs(&self, before_ms: i64) -> Result<usize>;

    // Schedule state
    fn get_schedule_state(&self, job_id: &str) -> Result<Option<JobScheduleState>>;
    fn update_schedule_state(&self, state: &JobScheduleState) -> Result<()>;

    // Job audit log
    fn log_job_audit(
        &self,
        job_id: &str,
        event_type: JobAuditEventType,
        duration_ms: Option<i64>,
        details: Option<&serde_json::Value>,
        error: Option<&str>,
    ) -> Result<i64>;
    fn get_job_audit_log_by_job(
        &self,
        job_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<JobAuditEntry>>;
    fn cleanup_old_job_audit_entries(&self, before_ms: i64) -> Result<usize>;

    // Run leases
    /// Takes or renews `name` for `holder`. Fails (returns false) only while another
    /// holder owns an unexpired lease.
    fn try_acquire_lease(&self, name: &str, holder: &str, ttl: Duration) -> Result<bool>;
    fn release_lease(&self, name: &str, holder: &str) -> Result<bool>;
    fn get_lease(&self, name: &str) -> Result<Option<LeaseRecord>>;
}
