//! Saved-search alert job.
//!
//! Drives one [`AlertRunner`] pass per tick and writes the run summary to the job
//! audit log.

use crate::alerts::{AlertRunner, RunOutcome, RunSummary};
use crate::background_jobs::{
    BackgroundJob, HookEvent, JobAuditLogger, JobContext, JobError, JobSchedule,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct SavedSearchAlertsJob {
    runner: Arc<AlertRunner>,
    interval: Duration,
    run_on_startup: bool,
}

impl SavedSearchAlertsJob {
    pub fn new(runner: Arc<AlertRunner>, interval: Duration, run_on_startup: bool) -> Self {
        Self {
            runner,
            interval,
            run_on_startup,
        }
    }
}

fn summary_details(summary: &RunSummary) -> serde_json::Value {
    serde_json::json!({
        "processed": summary.processed,
        "notified": summary.notified,
        "failed": summary.failed,
        "outcome": summary.outcome.as_str(),
    })
}

impl BackgroundJob for SavedSearchAlertsJob {
    fn id(&self) -> &'static str {
        "saved_search_alerts"
    }

    fn name(&self) -> &'static str {
        "Saved Search Alerts"
    }

    fn description(&self) -> &'static str {
        "Notify saved-search owners about newly listed matching vehicles"
    }

    fn schedule(&self) -> JobSchedule {
        if self.run_on_startup {
            JobSchedule::Combined {
                interval: Some(self.interval),
                hooks: vec![HookEvent::OnStartup],
            }
        } else {
            JobSchedule::Interval(self.interval)
        }
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let audit = JobAuditLogger::new(ctx.server_store.clone(), self.id());
        audit.log_started(Some(serde_json::json!({ "holder": self.runner.holder_id() })));

        let handle = tokio::runtime::Handle::try_current().map_err(|e| {
            let msg = format!("No tokio runtime available: {}", e);
            audit.log_failed(&msg, None);
            JobError::ExecutionFailed(msg)
        })?;

        let summary = handle.block_on(self.runner.run(&ctx.cancellation_token));
        let details = summary_details(&summary);

        match &summary.outcome {
            RunOutcome::Completed => {
                audit.log_completed(Some(details));
                Ok(())
            }
            RunOutcome::LeaseHeld => {
                info!("Alert run skipped, another runner holds the lease");
                audit.log_completed(Some(details));
                Ok(())
            }
            RunOutcome::Cancelled => {
                audit.log_failed("Cancelled", Some(details));
                Err(JobError::Cancelled)
            }
            RunOutcome::LeaseLost => {
                let msg = "Lease lost mid-run, another runner took over";
                warn!("{}", msg);
                audit.log_failed(msg, Some(details));
                Err(JobError::ExecutionFailed(msg.to_string()))
            }
            RunOutcome::Aborted(reason) => {
                warn!("Alert run aborted: {}", reason);
                audit.log_failed(reason, Some(details));
                Err(JobError::ExecutionFailed(reason.clone()))
            }
        }
    }
}
