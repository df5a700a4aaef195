use super::context::JobContext;
use super::job::{BackgroundJob, HookEvent, JobError, ShutdownBehavior};
use crate::metrics;
use crate::server_store::{JobRunStatus, JobScheduleState, ServerStore};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Upper bound on how long the scheduler sleeps between checks.
const MAX_SLEEP: Duration = Duration::from_secs(60);

/// How long shutdown waits for each running job.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Manages background job scheduling and execution.
pub struct JobScheduler {
    jobs: HashMap<String, Arc<dyn BackgroundJob>>,

    /// Currently running jobs with their task handles.
    running_handles: HashMap<String, JoinHandle<()>>,

    /// Cancellation tokens for each running job.
    job_cancel_tokens: HashMap<String, CancellationToken>,

    /// Server store for persisting job history and schedule state.
    server_store: Arc<dyn ServerStore>,

    /// Token to signal scheduler shutdown.
    shutdown_token: CancellationToken,

    /// Shared context provided to jobs during execution.
    job_context: JobContext,
}

impl JobScheduler {
    pub fn new(
        server_store: Arc<dyn ServerStore>,
        shutdown_token: CancellationToken,
        job_context: JobContext,
    ) -> Self {
        Self {
            jobs: HashMap::new(),
            running_handles: HashMap::new(),
            job_cancel_tokens: HashMap::new(),
            server_store,
            shutdown_token,
            job_context,
        }
    }

    pub fn register_job(&mut self, job: Arc<dyn BackgroundJob>) {
        info!("Registering job: {} - {}", job.id(), job.description());
        self.jobs.insert(job.id().to_string(), job);
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    fn is_running(&self, job_id: &str) -> bool {
        self.running_handles
            .get(job_id)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Main scheduler loop. Returns once the shutdown token is cancelled and running
    /// jobs have been given a chance to finish.
    pub async fn run(&mut self) {
        info!(
            "Starting job scheduler with {} registered jobs",
            self.job_count()
        );

        match self.server_store.mark_stale_jobs_failed() {
            Ok(count) if count > 0 => {
                info!("Marked {} stale jobs as failed from previous run", count);
            }
            Ok(_) => {}
            Err(e) => {
                error!("Failed to mark stale jobs: {}", e);
            }
        }

        self.trigger_jobs_for_hook(HookEvent::OnStartup);

        loop {
            self.cleanup_completed_jobs().await;

            let sleep_duration = self.time_until_next_scheduled_job();
            debug!(
                "Scheduler sleeping for {:?} until next scheduled job",
                sleep_duration
            );

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration) => {
                    self.run_due_jobs();
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("Job scheduler stopped");
    }

    /// Next run of an interval job. Jobs that never ran are due immediately.
    fn next_run_time(&self, job: &dyn BackgroundJob) -> Option<DateTime<Utc>> {
        job.schedule().interval()?;
        match self.server_store.get_schedule_state(job.id()) {
            Ok(Some(state)) => Some(state.next_run_at),
            Ok(None) => Some(Utc::now()),
            Err(e) => {
                warn!("Failed to read schedule state for {}: {}", job.id(), e);
                None
            }
        }
    }

    fn time_until_next_scheduled_job(&self) -> Duration {
        let now = Utc::now();
        let mut min_duration = MAX_SLEEP;

        for (job_id, job) in &self.jobs {
            if self.is_running(job_id) {
                continue;
            }
            if let Some(next_run) = self.next_run_time(job.as_ref()) {
                if next_run <= now {
                    return Duration::ZERO;
                }
                let until = (next_run - now).to_std().unwrap_or(Duration::from_secs(1));
                min_duration = min_duration.min(until);
            }
        }

        min_duration
    }

    fn run_due_jobs(&mut self) {
        let now = Utc::now();
        let due: Vec<String> = self
            .jobs
            .iter()
            .filter(|(job_id, _)| !self.is_running(job_id))
            .filter(|(_, job)| {
                self.next_run_time(job.as_ref())
                    .is_some_and(|next_run| next_run <= now)
            })
            .map(|(job_id, _)| job_id.clone())
            .collect();

        for job_id in due {
            self.spawn_job(&job_id, "schedule");
        }
    }

    fn trigger_jobs_for_hook(&mut self, event: HookEvent) {
        let triggered: Vec<String> = self
            .jobs
            .iter()
            .filter(|(_, job)| job.schedule().listens_to(event))
            .map(|(job_id, _)| job_id.clone())
            .collect();

        for job_id in triggered {
            if self.is_running(&job_id) {
                debug!("Skipping hook trigger for already running job: {}", job_id);
                continue;
            }
            self.spawn_job(&job_id, &format!("hook:{}", event));
        }
    }

    fn spawn_job(&mut self, job_id: &str, triggered_by: &str) {
        let Some(job) = self.jobs.get(job_id).map(Arc::clone) else {
            error!("Attempted to spawn unknown job: {}", job_id);
            return;
        };

        let run_id = match self.server_store.record_job_start(job_id, triggered_by) {
            Ok(id) => id,
            Err(e) => {
                error!("Failed to record job start for {}: {}", job_id, e);
                return;
            }
        };

        info!(
            "Starting job: {} (run_id: {}, triggered_by: {})",
            job_id, run_id, triggered_by
        );

        // Push next_run_at forward now so the loop does not re-trigger the job while it runs.
        self.update_schedule_state(job.as_ref(), None);

        metrics::set_background_job_running(job_id, true);

        let cancel_token = self.job_context.cancellation_token.child_token();
        self.job_cancel_tokens
            .insert(job_id.to_string(), cancel_token.clone());
        let ctx = JobContext::new(cancel_token, Arc::clone(&self.job_context.server_store));

        let server_store = Arc::clone(&self.server_store);
        let job_id_owned = job_id.to_string();

        let handle = tokio::spawn(async move {
            let start_time = Instant::now();
            let result = tokio::task::spawn_blocking(move || job.execute(&ctx)).await;
            let elapsed = start_time.elapsed();

            let (status, error_msg, status_label) = match result {
                Ok(Ok(())) => {
                    info!(
                        "Job {} completed successfully in {:?}",
                        job_id_owned, elapsed
                    );
                    (JobRunStatus::Completed, None, "success")
                }
                Ok(Err(JobError::Cancelled)) => {
                    info!("Job {} was cancelled after {:?}", job_id_owned, elapsed);
                    (
                        JobRunStatus::Failed,
                        Some("Cancelled".to_string()),
                        "cancelled",
                    )
                }
                Ok(Err(e)) => {
                    error!("Job {} failed after {:?}: {}", job_id_owned, elapsed, e);
                    (JobRunStatus::Failed, Some(e.to_string()), "failed")
                }
                Err(e) => {
                    error!("Job {} panicked after {:?}: {}", job_id_owned, elapsed, e);
                    (
                        JobRunStatus::Failed,
                        Some(format!("Task panic: {}", e)),
                        "panic",
                    )
                }
            };

            metrics::record_background_job_execution(&job_id_owned, status_label, elapsed);
            metrics::set_background_job_running(&job_id_owned, false);

            if let Err(e) = server_store.record_job_finish(run_id, status, error_msg) {
                error!("Failed to record job finish for {}: {}", job_id_owned, e);
            }
        });

        self.running_handles.insert(job_id.to_string(), handle);
    }

    /// Stores `next_run_at = now + interval` for interval jobs.
    fn update_schedule_state(&self, job: &dyn BackgroundJob, last_run_at: Option<DateTime<Utc>>) {
        let Some(interval) = job.schedule().interval() else {
            return;
        };
        let state = JobScheduleState {
            job_id: job.id().to_string(),
            next_run_at: Utc::now() + chrono::Duration::from_std(interval).unwrap_or_default(),
            last_run_at,
        };
        if let Err(e) = self.server_store.update_schedule_state(&state) {
            error!("Failed to update schedule state for {}: {}", job.id(), e);
        }
    }

    async fn cleanup_completed_jobs(&mut self) {
        let completed: Vec<String> = self
            .running_handles
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(job_id, _)| job_id.clone())
            .collect();

        for job_id in completed {
            if let Some(handle) = self.running_handles.remove(&job_id) {
                let _ = handle.await;
            }
            self.job_cancel_tokens.remove(&job_id);
            if let Some(job) = self.jobs.get(&job_id) {
                self.update_schedule_state(job.as_ref(), Some(Utc::now()));
            }
        }
    }

    async fn shutdown(&mut self) {
        info!("Shutting down scheduler...");

        for (job_id, token) in &self.job_cancel_tokens {
            let cancellable = self
                .jobs
                .get(job_id)
                .map_or(true, |job| job.shutdown_behavior() == ShutdownBehavior::Cancellable);
            if cancellable {
                debug!("Cancelling job: {}", job_id);
                token.cancel();
            }
        }

        for (job_id, handle) in self.running_handles.drain() {
            let waits = self
                .jobs
                .get(&job_id)
                .is_some_and(|job| job.shutdown_behavior() == ShutdownBehavior::WaitForCompletion);
            if waits {
                info!("Waiting for job {} to complete...", job_id);
            }
            if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                warn!("Job {} did not stop within {:?}", job_id, SHUTDOWN_GRACE);
            }
        }

        self.job_cancel_tokens.clear();
        info!("Scheduler shutdown complete");
    }
}
