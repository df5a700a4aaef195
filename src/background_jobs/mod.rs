//! Background job scheduling.
//!
//! Jobs implement [`BackgroundJob`] and are driven by [`JobScheduler`], which runs them
//! on an interval and/or in response to hook events. Every execution is recorded in the
//! server store (run history, schedule state and audit log).

mod audit_logger;
mod context;
mod job;
pub mod jobs;
mod scheduler;

pub use audit_logger::JobAuditLogger;
pub use context::JobContext;
pub use job::{BackgroundJob, HookEvent, JobError, JobSchedule, ShutdownBehavior};
pub use scheduler::JobScheduler;

use crate::server_store::ServerStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Builds a scheduler whose jobs are cancelled together with `shutdown_token`.
pub fn create_scheduler(
    server_store: Arc<dyn ServerStore>,
    shutdown_token: CancellationToken,
) -> JobScheduler {
    let job_context = JobContext::new(shutdown_token.child_token(), server_store.clone());
    JobScheduler::new(server_store, shutdown_token, job_context)
}
