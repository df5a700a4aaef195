//! Scheduler-driven alert runs.

mod common;

use common::*;
use sentinelle::background_jobs::create_scheduler;
use sentinelle::background_jobs::jobs::SavedSearchAlertsJob;
use sentinelle::saved_search::FilterFields;
use sentinelle::server_store::{JobAuditEventType, JobRunStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test(flavor = "multi_thread")]
async fn test_startup_hook_runs_alerts_and_records_history() {
    let env = TestEnv::new();
    let search = env.create_search(
        OWNER_1,
        None,
        FilterFields {
            brand: Some(BRAND_RENAULT.to_string()),
            ..Default::default()
        },
    );
    env.insert(listing_after(&search, 60, "v-1", BRAND_RENAULT, "Captur", 18_000));

    let shutdown = CancellationToken::new();
    let mut scheduler = create_scheduler(env.server_store.clone(), shutdown.clone());
    scheduler.register_job(Arc::new(SavedSearchAlertsJob::new(
        Arc::new(env.runner()),
        Duration::from_secs(3600),
        true,
    )));
    let handle = tokio::spawn(async move {
        scheduler.run().await;
    });

    tokio::time::sleep(Duration::from_millis(500)).await;
    shutdown.cancel();
    handle.await.unwrap();

    assert_eq!(env.marketplace.list_notifications(OWNER_1, 10).unwrap().len(), 1);

    let history = env
        .server_store
        .get_job_history("saved_search_alerts", 10)
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, JobRunStatus::Completed);
    assert_eq!(history[0].triggered_by, "hook:OnStartup");

    let audit = env
        .server_store
        .get_job_audit_log_by_job("saved_search_alerts", 10, 0)
        .unwrap();
    assert_eq!(audit[0].event_type, JobAuditEventType::Completed);
    assert_eq!(audit[0].details.as_ref().unwrap()["notified"], 1);
}
