//! Job history cleanup background job.
//!
//! Deletes finished job runs and audit log entries older than the configured
//! retention period.

use crate::background_jobs::{
    BackgroundJob, JobAuditLogger, JobContext, JobError, JobSchedule, ShutdownBehavior,
};
use chrono::Utc;
use std::time::Duration;
use tracing::info;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

pub struct JobHistoryCleanupJob {
    retention_days: u64,
}

impl JobHistoryCleanupJob {
    pub fn new(retention_days: u64) -> Self {
        Self { retention_days }
    }

    fn cutoff_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.retention_days as i64 * DAY_MS
    }
}

impl BackgroundJob for JobHistoryCleanupJob {
    fn id(&self) -> &'static str {
        "job_history_cleanup"
    }

    fn name(&self) -> &'static str {
        "Job History Cleanup"
    }

    fn description(&self) -> &'static str {
        "Delete old job runs and audit entries based on retention policy"
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::Interval(Duration::from_secs(24 * 60 * 60))
    }

    fn shutdown_behavior(&self) -> ShutdownBehavior {
        ShutdownBehavior::WaitForCompletion
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let audit = JobAuditLogger::new(ctx.server_store.clone(), self.id());
        let cutoff = self.cutoff_ms(Utc::now().timestamp_millis());
        audit.log_started(Some(serde_json::json!({
            "retention_days": self.retention_days,
            "cutoff_ms": cutoff,
        })));

        info!(
            "Cleaning up job history older than {} days (cutoff: {})",
            self.retention_days, cutoff
        );

        let runs_deleted = ctx.server_store.cleanup_old_job_runs(cutoff).map_err(|e| {
            audit.log_failed(&e.to_string(), None);
            JobError::ExecutionFailed(e.to_string())
        })?;
        audit.log_progress(serde_json::json!({ "job_runs_deleted": runs_deleted }));

        let entries_deleted = ctx
            .server_store
            .cleanup_old_job_audit_entries(cutoff)
            .map_err(|e| {
                audit.log_failed(&e.to_string(), None);
                JobError::ExecutionFailed(e.to_string())
            })?;

        info!(
            "Deleted {} job runs and {} audit entries",
            runs_deleted, entries_deleted
        );
        audit.log_completed(Some(serde_json::json!({
            "job_runs_deleted": runs_deleted,
            "audit_entries_deleted": entries_deleted,
        })));

        Ok(())
    }
}
