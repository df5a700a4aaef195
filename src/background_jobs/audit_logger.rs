//! Job audit logging utilities.

use crate::server_store::{JobAuditEventType, ServerStore};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// Writes started/completed/failed/progress events for one job execution to the
/// audit log. Audit write failures are logged and otherwise ignored.
pub struct JobAuditLogger {
    server_store: Arc<dyn ServerStore>,
    job_id: String,
    start_time: Instant,
}

impl JobAuditLogger {
    pub fn new(server_store: Arc<dyn ServerStore>, job_id: &str) -> Self {
        Self {
            server_store,
            job_id: job_id.to_string(),
            start_time: Instant::now(),
        }
    }

    fn log(
        &self,
        event_type: JobAuditEventType,
        duration_ms: Option<i64>,
        details: Option<&serde_json::Value>,
        error: Option<&str>,
    ) {
        if let Err(e) =
            self.server_store
                .log_job_audit(&self.job_id, event_type, duration_ms, details, error)
        {
            warn!("Failed to write audit entry for job {}: {}", self.job_id, e);
        }
    }

    pub fn log_started(&self, details: Option<serde_json::Value>) {
        self.log(JobAuditEventType::Started, None, details.as_ref(), None);
    }

    pub fn log_completed(&self, details: Option<serde_json::Value>) {
        self.log(
            JobAuditEventType::Completed,
            Some(self.elapsed_ms()),
            details.as_ref(),
            None,
        );
    }

    pub fn log_failed(&self, error: &str, details: Option<serde_json::Value>) {
        self.log(
            JobAuditEventType::Failed,
            Some(self.elapsed_ms()),
            details.as_ref(),
            Some(error),
        );
    }

    pub fn log_progress(&self, details: serde_json::Value) {
        self.log(JobAuditEventType::Progress, None, Some(&details), None);
    }

    pub fn elapsed_ms(&self) -> i64 {
        self.start_time.elapsed().as_millis() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server_store::SqliteServerStore;
    use tempfile::TempDir;

    #[test]
    fn test_events_are_written_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let store: Arc<dyn ServerStore> =
            Arc::new(SqliteServerStore::new(temp_dir.path().join("server.db")).unwrap());
        let audit = JobAuditLogger::new(store.clone(), "job");

        audit.log_started(None);
        audit.log_progress(serde_json::json!({"step": 1}));
        audit.log_failed("boom", Some(serde_json::json!({"processed": 2})));

        let entries = store.get_job_audit_log_by_job("job", 10, 0).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].event_type, JobAuditEventType::Failed);
        assert_eq!(entries[0].error.as_deref(), Some("boom"));
        assert!(entries[0].duration_ms.is_some());
        assert_eq!(entries[1].event_type, JobAuditEventType::Progress);
        assert_eq!(entries[2].event_type, JobAuditEventType::Started);
    }
}
