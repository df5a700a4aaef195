//! Batch runner: one pass over every active saved search.
//!
//! Delivery is at-least-once. A search whose delivery fails keeps its watermark and is
//! retried on the next scheduled run; a search whose watermark write fails after delivery
//! may be notified twice.

use super::composer::AlertComposer;
use super::error::{AlertError, AlertStage};
use super::freshness::new_matches;
use super::lease::{RunLease, ALERT_RUN_LEASE};
use super::watermark::next_watermark;
use crate::inventory::InventorySearch;
use crate::metrics;
use crate::notifications::NotificationSink;
use crate::saved_search::{CriteriaStore, SavedSearch};
use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerSettings {
    /// Upper bound for every collaborator call.
    pub call_timeout: Duration,
    /// Lifetime of the single-run lease. Should exceed the longest expected run.
    pub lease_ttl: Duration,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            lease_ttl: Duration::from_secs(55 * 60),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum RunOutcome {
    /// Every active search was considered.
    Completed,
    /// Stopped between two searches because cancellation was requested.
    Cancelled,
    /// Another runner holds the lease.
    LeaseHeld,
    /// The lease expired or was taken over mid-run; stopped before the next side effect.
    LeaseLost,
    /// The lease or the list of active searches could not be obtained.
    Aborted(String),
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Completed => "completed",
            RunOutcome::Cancelled => "cancelled",
            RunOutcome::LeaseHeld => "lease_held",
            RunOutcome::LeaseLost => "lease_lost",
            RunOutcome::Aborted(_) => "aborted",
        }
    }
}

/// Counters reported by a run.
///
/// `processed` counts active searches considered, `notified` the ones for which an alert
/// was delivered, `failed` the ones that hit any failure (including a watermark write
/// after a successful delivery, which counts toward both `notified` and `failed`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub notified: usize,
    pub failed: usize,
    pub outcome: RunOutcome,
}

impl RunSummary {
    fn empty(outcome: RunOutcome) -> Self {
        Self {
            processed: 0,
            notified: 0,
            failed: 0,
            outcome,
        }
    }
}

/// Result of handling one saved search.
#[derive(Debug)]
enum SearchOutcome {
    NoNewMatches,
    Notified { notification_id: String },
    /// Delivered, but the watermark could not be advanced.
    NotifiedWatermarkStale { notification_id: String, error: AlertError },
    /// The lease was no longer ours when the alert was ready; nothing was delivered.
    LeaseLost,
}

pub struct AlertRunner {
    criteria: Arc<dyn CriteriaStore>,
    inventory: Arc<dyn InventorySearch>,
    sink: Arc<dyn NotificationSink>,
    lease: Arc<dyn RunLease>,
    composer: AlertComposer,
    settings: RunnerSettings,
    holder_id: String,
}

impl AlertRunner {
    pub fn new(
        criteria: Arc<dyn CriteriaStore>,
        inventory: Arc<dyn InventorySearch>,
        sink: Arc<dyn NotificationSink>,
        lease: Arc<dyn RunLease>,
        composer: AlertComposer,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            criteria,
            inventory,
            sink,
            lease,
            composer,
            settings,
            holder_id: format!("alert-runner-{}", Uuid::new_v4()),
        }
    }

    pub fn holder_id(&self) -> &str {
        &self.holder_id
    }

    /// Runs one pass over all active saved searches.
    ///
    /// Never fails as a whole: lease and fetch problems end the run with zero counts,
    /// per-search problems are logged and counted and the loop moves on.
    pub async fn run(&self, cancel: &CancellationToken) -> RunSummary {
        let started = Instant::now();

        let summary = match self.acquire_lease().await {
            Ok(true) => {
                let summary = self.run_locked(cancel).await;
                self.release_lease().await;
                summary
            }
            Ok(false) => {
                info!(
                    "Skipping alert run: lease '{}' is held by another runner",
                    ALERT_RUN_LEASE
                );
                RunSummary::empty(RunOutcome::LeaseHeld)
            }
            Err(e) => {
                error!("Skipping alert run: {}", e);
                metrics::record_alert_failure(e.stage().as_str());
                RunSummary::empty(RunOutcome::Aborted(e.to_string()))
            }
        };

        metrics::record_alert_run(
            summary.outcome.as_str(),
            summary.processed,
            summary.notified,
            started.elapsed(),
        );
        info!(
            "Alert run {}: processed={} notified={} failed={} in {:?}",
            summary.outcome.as_str(),
            summary.processed,
            summary.notified,
            summary.failed,
            started.elapsed()
        );
        summary
    }

    async fn run_locked(&self, cancel: &CancellationToken) -> RunSummary {
        let searches = match self
            .bounded(AlertStage::Fetch, self.criteria.list_active())
            .await
        {
            Ok(searches) => searches,
            Err(e) => {
                error!("Aborting alert run: {}", e);
                metrics::record_alert_failure(e.stage().as_str());
                return RunSummary::empty(RunOutcome::Aborted(e.to_string()));
            }
        };
        debug!("Fetched {} active saved searches", searches.len());

        let mut summary = RunSummary::empty(RunOutcome::Completed);
        for search in searches.iter().filter(|s| s.is_active) {
            if cancel.is_cancelled() {
                info!(
                    "Alert run cancelled after {} saved searches",
                    summary.processed
                );
                summary.outcome = RunOutcome::Cancelled;
                break;
            }
            if !self.renew_lease().await {
                summary.outcome = RunOutcome::LeaseLost;
                break;
            }

            let outcome = self.process_search(search).await;
            if matches!(outcome, Ok(SearchOutcome::LeaseLost)) {
                summary.outcome = RunOutcome::LeaseLost;
                break;
            }

            summary.processed += 1;
            match outcome {
                Ok(SearchOutcome::NoNewMatches) | Ok(SearchOutcome::LeaseLost) => {}
                Ok(SearchOutcome::Notified { notification_id }) => {
                    debug!(
                        "Saved search {} notified (notification {})",
                        search.id, notification_id
                    );
                    summary.notified += 1;
                }
                Ok(SearchOutcome::NotifiedWatermarkStale {
                    notification_id,
                    error,
                }) => {
                    error!(
                        "Saved search {} was notified (notification {}) but its watermark \
                         was not advanced, next run may notify again: {}",
                        search.id, notification_id, error
                    );
                    metrics::record_alert_failure(error.stage().as_str());
                    summary.notified += 1;
                    summary.failed += 1;
                }
                Err(e) => {
                    warn!("Saved search {} skipped: {}", search.id, e);
                    metrics::record_alert_failure(e.stage().as_str());
                    summary.failed += 1;
                }
            }
        }

        summary
    }

    async fn process_search(&self, search: &SavedSearch) -> Result<SearchOutcome, AlertError> {
        if search.filters.is_unconstrained() {
            debug!(
                "Saved search {} has no constraints, every new listing matches",
                search.id
            );
        }
        let observed_at = Utc::now();
        let matches = self
            .bounded(AlertStage::Search, self.inventory.search(&search.filters))
            .await?;

        let fresh = new_matches(search, matches);
        if fresh.is_empty() {
            debug!("No new matches for saved search {}", search.id);
            return Ok(SearchOutcome::NoNewMatches);
        }

        let alert = self.composer.compose(search, &fresh)?;
        if !self.renew_lease().await {
            return Ok(SearchOutcome::LeaseLost);
        }
        let notification = self
            .bounded(AlertStage::Delivery, self.sink.deliver(&alert))
            .await?;

        let watermark = next_watermark(search, &fresh, observed_at);
        match self
            .bounded(
                AlertStage::Watermark,
                self.criteria.set_last_notified(&search.id, watermark),
            )
            .await
        {
            Ok(()) => Ok(SearchOutcome::Notified {
                notification_id: notification.id,
            }),
            Err(error) => Ok(SearchOutcome::NotifiedWatermarkStale {
                notification_id: notification.id,
                error,
            }),
        }
    }

    async fn acquire_lease(&self) -> Result<bool, AlertError> {
        self.bounded(
            AlertStage::Lease,
            self.lease
                .try_acquire(ALERT_RUN_LEASE, &self.holder_id, self.settings.lease_ttl),
        )
        .await
    }

    /// Extends the lease for this holder. False when another runner took it over or the
    /// lease store failed; the caller must stop before any further side effect.
    async fn renew_lease(&self) -> bool {
        match self.acquire_lease().await {
            Ok(true) => true,
            Ok(false) => {
                warn!(
                    "Lease '{}' was taken over by another runner, stopping",
                    ALERT_RUN_LEASE
                );
                metrics::record_alert_failure(AlertStage::Lease.as_str());
                false
            }
            Err(e) => {
                warn!("Failed to renew lease '{}', stopping: {}", ALERT_RUN_LEASE, e);
                metrics::record_alert_failure(e.stage().as_str());
                false
            }
        }
    }

    async fn release_lease(&self) {
        if let Err(e) = self
            .bounded(
                AlertStage::Lease,
                self.lease.release(ALERT_RUN_LEASE, &self.holder_id),
            )
            .await
        {
            warn!("Failed to release lease '{}': {}", ALERT_RUN_LEASE, e);
        }
    }

    async fn bounded<T, F>(&self, stage: AlertStage, call: F) -> Result<T, AlertError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout(self.settings.call_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(AlertError::at(stage, e)),
            Err(_) => Err(AlertError::Timeout {
                stage,
                timeout_secs: self.settings.call_timeout.as_secs(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::lease::InMemoryLease;
    use crate::inventory::VehicleListing;
    use crate::marketplace_store::InMemoryMarketplace;
    use crate::saved_search::FilterFields;
    use chrono::{DateTime, Duration as ChronoDuration};

    fn saved_search(id: &str, owner: &str, brand: &str) -> SavedSearch {
        SavedSearch {
            id: id.to_string(),
            owner_id: owner.to_string(),
            name: Some(format!("{} alert", brand)),
            is_active: true,
            filters: FilterFields {
                brand: Some(brand.to_string()),
                ..Default::default()
            },
            created_at: Utc::now() - ChronoDuration::days(2),
            last_notified_at: None,
        }
    }

    fn listing(id: &str, brand: &str, price: i64, created_at: DateTime<Utc>) -> VehicleListing {
        VehicleListing::new(id, brand, "Modèle", price, created_at)
    }

    fn runner_with(
        market: &Arc<InMemoryMarketplace>,
        lease: Arc<InMemoryLease>,
        settings: RunnerSettings,
    ) -> AlertRunner {
        AlertRunner::new(
            market.clone(),
            market.clone(),
            market.clone(),
            lease,
            AlertComposer::default(),
            settings,
        )
    }

    fn runner(market: &Arc<InMemoryMarketplace>) -> AlertRunner {
        runner_with(
            market,
            Arc::new(InMemoryLease::new()),
            RunnerSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_single_match_is_notified_and_watermarked() {
        let market = Arc::new(InMemoryMarketplace::new());
        market.add_search(saved_search("s-1", "u-1", "Porsche"));
        market.add_listing(listing(
            "v-1",
            "Porsche",
            95_000,
            Utc::now() - ChronoDuration::hours(1),
        ));

        let summary = runner(&market).run(&CancellationToken::new()).await;

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.notified, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.outcome, RunOutcome::Completed);

        let delivered = market.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].recipient_id, "u-1");
        assert_eq!(delivered[0].title, "🔔 Nouvelles annonces : Porsche alert");
        assert_eq!(delivered[0].link, "/recherche?brand=Porsche");
        assert_eq!(delivered[0].payload.vehicle_ids, vec!["v-1"]);
        assert!(market.watermark("s-1").is_some());
    }

    #[tokio::test]
    async fn test_second_run_without_new_listings_is_silent() {
        let market = Arc::new(InMemoryMarketplace::new());
        market.add_search(saved_search("s-1", "u-1", "Porsche"));
        market.add_listing(listing(
            "v-1",
            "Porsche",
            95_000,
            Utc::now() - ChronoDuration::hours(1),
        ));
        let runner = runner(&market);

        runner.run(&CancellationToken::new()).await;
        let watermark = market.watermark("s-1");
        let summary = runner.run(&CancellationToken::new()).await;

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.notified, 0);
        assert_eq!(market.delivered().len(), 1);
        assert_eq!(market.watermark("s-1"), watermark);
    }

    #[tokio::test]
    async fn test_many_matches_produce_one_alert() {
        let market = Arc::new(InMemoryMarketplace::new());
        market.add_search(saved_search("s-1", "u-1", "Audi"));
        let now = Utc::now();
        for i in 0..5 {
            market.add_listing(listing(
                &format!("v-{}", i),
                "Audi",
                30_000 + i,
                now - ChronoDuration::minutes(10 + i),
            ));
        }

        let summary = runner(&market).run(&CancellationToken::new()).await;
        assert_eq!(summary.notified, 1);

        let delivered = market.delivered();
        assert_eq!(delivered.len(), 1);
        let alert = &delivered[0];
        assert_eq!(alert.body.matches("• ").count(), 3);
        assert!(alert.body.ends_with("… et 2 autres annonces"));
        assert_eq!(alert.payload.match_count, 5);
        assert_eq!(
            alert.payload.vehicle_ids,
            vec!["v-0", "v-1", "v-2", "v-3", "v-4"]
        );
    }

    #[tokio::test]
    async fn test_inactive_search_is_ignored() {
        let market = Arc::new(InMemoryMarketplace::new());
        let mut inactive = saved_search("s-1", "u-1", "Porsche");
        inactive.is_active = false;
        market.add_search(inactive);
        market.add_listing(listing(
            "v-1",
            "Porsche",
            95_000,
            Utc::now() - ChronoDuration::hours(1),
        ));

        let summary = runner(&market).run(&CancellationToken::new()).await;

        assert_eq!(summary.processed, 0);
        assert_eq!(summary.notified, 0);
        assert!(market.delivered().is_empty());
        assert!(market.watermark("s-1").is_none());
    }

    #[tokio::test]
    async fn test_delivery_failure_is_isolated() {
        let market = Arc::new(InMemoryMarketplace::new());
        market.add_search(saved_search("s-1", "u-1", "Porsche"));
        market.add_search(saved_search("s-2", "u-2", "Porsche"));
        market.add_search(saved_search("s-3", "u-3", "Porsche"));
        market.add_listing(listing(
            "v-1",
            "Porsche",
            95_000,
            Utc::now() - ChronoDuration::hours(1),
        ));
        market.fail_delivery_to("u-2");

        let summary = runner(&market).run(&CancellationToken::new()).await;

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.notified, 2);
        assert_eq!(summary.failed, 1);
        assert!(market.watermark("s-1").is_some());
        assert!(market.watermark("s-2").is_none());
        assert!(market.watermark("s-3").is_some());
    }

    #[tokio::test]
    async fn test_failed_delivery_is_retried_next_run() {
        let market = Arc::new(InMemoryMarketplace::new());
        market.add_search(saved_search("s-1", "u-1", "Porsche"));
        market.add_listing(listing(
            "v-1",
            "Porsche",
            95_000,
            Utc::now() - ChronoDuration::hours(1),
        ));
        market.fail_delivery_to("u-1");
        let runner = runner(&market);

        assert_eq!(runner.run(&CancellationToken::new()).await.notified, 0);

        market.clear_failures();
        let summary = runner.run(&CancellationToken::new()).await;
        assert_eq!(summary.notified, 1);
        assert_eq!(market.delivered()[0].payload.vehicle_ids, vec!["v-1"]);
    }

    #[tokio::test]
    async fn test_search_failure_does_not_stop_the_run() {
        let market = Arc::new(InMemoryMarketplace::new());
        market.add_search(saved_search("s-1", "u-1", "Lancia"));
        market.add_search(saved_search("s-2", "u-2", "Porsche"));
        market.add_listing(listing(
            "v-1",
            "Porsche",
            95_000,
            Utc::now() - ChronoDuration::hours(1),
        ));
        market.fail_search_for_brand("Lancia");

        let summary = runner(&market).run(&CancellationToken::new()).await;

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.notified, 1);
        assert_eq!(summary.failed, 1);
        assert!(market.watermark("s-1").is_none());
    }

    #[tokio::test]
    async fn test_watermark_failure_still_counts_as_notified() {
        let market = Arc::new(InMemoryMarketplace::new());
        market.add_search(saved_search("s-1", "u-1", "Porsche"));
        market.add_listing(listing(
            "v-1",
            "Porsche",
            95_000,
            Utc::now() - ChronoDuration::hours(1),
        ));
        market.fail_watermark_for("s-1");

        let summary = runner(&market).run(&CancellationToken::new()).await;

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.notified, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(market.delivered().len(), 1);
        assert!(market.watermark("s-1").is_none());
    }

    #[tokio::test]
    async fn test_listings_older_than_search_are_never_reported() {
        let market = Arc::new(InMemoryMarketplace::new());
        let search = saved_search("s-1", "u-1", "Porsche");
        let before_creation = search.created_at - ChronoDuration::hours(1);
        market.add_search(search);
        market.add_listing(listing("v-old", "Porsche", 80_000, before_creation));

        let summary = runner(&market).run(&CancellationToken::new()).await;

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.notified, 0);
        assert!(market.delivered().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_with_zero_counts() {
        let market = Arc::new(InMemoryMarketplace::new());
        market.add_search(saved_search("s-1", "u-1", "Porsche"));
        market.fail_list_active();
        let lease = Arc::new(InMemoryLease::new());

        let summary = runner_with(&market, lease.clone(), RunnerSettings::default())
            .run(&CancellationToken::new())
            .await;

        assert_eq!(summary.processed, 0);
        assert_eq!(summary.notified, 0);
        assert!(matches!(summary.outcome, RunOutcome::Aborted(_)));
        assert!(lease.holder(ALERT_RUN_LEASE).is_none());
    }

    #[tokio::test]
    async fn test_held_lease_skips_the_run() {
        let market = Arc::new(InMemoryMarketplace::new());
        market.add_search(saved_search("s-1", "u-1", "Porsche"));
        market.add_listing(listing(
            "v-1",
            "Porsche",
            95_000,
            Utc::now() - ChronoDuration::hours(1),
        ));
        let lease = Arc::new(InMemoryLease::new());
        lease
            .try_acquire(ALERT_RUN_LEASE, "other-node", Duration::from_secs(600))
            .await
            .unwrap();

        let summary = runner_with(&market, lease.clone(), RunnerSettings::default())
            .run(&CancellationToken::new())
            .await;

        assert_eq!(summary, RunSummary::empty(RunOutcome::LeaseHeld));
        assert!(market.delivered().is_empty());
        assert_eq!(
            lease.holder(ALERT_RUN_LEASE),
            Some("other-node".to_string())
        );
    }

    #[tokio::test]
    async fn test_lease_is_released_after_run() {
        let market = Arc::new(InMemoryMarketplace::new());
        let lease = Arc::new(InMemoryLease::new());
        let runner = runner_with(&market, lease.clone(), RunnerSettings::default());

        runner.run(&CancellationToken::new()).await;

        assert!(lease.holder(ALERT_RUN_LEASE).is_none());
    }

    #[tokio::test]
    async fn test_slow_search_times_out() {
        let market = Arc::new(InMemoryMarketplace::new());
        market.add_search(saved_search("s-1", "u-1", "Porsche"));
        market.add_listing(listing(
            "v-1",
            "Porsche",
            95_000,
            Utc::now() - ChronoDuration::hours(1),
        ));
        market.delay_search(Duration::from_millis(500));
        let settings = RunnerSettings {
            call_timeout: Duration::from_millis(50),
            ..Default::default()
        };

        let summary = runner_with(&market, Arc::new(InMemoryLease::new()), settings)
            .run(&CancellationToken::new())
            .await;

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.notified, 0);
        assert_eq!(summary.failed, 1);
        assert!(market.delivered().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_run_stops_before_next_search() {
        let market = Arc::new(InMemoryMarketplace::new());
        market.add_search(saved_search("s-1", "u-1", "Porsche"));
        market.add_search(saved_search("s-2", "u-2", "Porsche"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = runner(&market).run(&cancel).await;

        assert_eq!(summary.processed, 0);
        assert_eq!(summary.outcome, RunOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_cancellation_during_search_finishes_current_search() {
        let market = Arc::new(InMemoryMarketplace::new());
        market.add_search(saved_search("s-1", "u-1", "Porsche"));
        market.add_search(saved_search("s-2", "u-2", "Porsche"));
        market.add_listing(listing(
            "v-1",
            "Porsche",
            95_000,
            Utc::now() - ChronoDuration::hours(1),
        ));
        market.delay_search(Duration::from_millis(200));
        let runner = runner(&market);
        let cancel = CancellationToken::new();

        let (summary, _) = tokio::join!(runner.run(&cancel), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });

        assert_eq!(summary.outcome, RunOutcome::Cancelled);
        assert_eq!((summary.processed, summary.notified, summary.failed), (1, 1, 0));
        assert_eq!(market.delivered().len(), 1);
        assert_eq!(market.delivered()[0].recipient_id, "u-1");
        assert!(market.watermark("s-1").is_some());
        assert!(market.watermark("s-2").is_none());
    }

    #[tokio::test]
    async fn test_expired_lease_taken_over_mid_run_prevents_duplicate() {
        let market = Arc::new(InMemoryMarketplace::new());
        market.add_search(saved_search("s-1", "u-1", "Porsche"));
        market.add_listing(listing(
            "v-1",
            "Porsche",
            95_000,
            Utc::now() - ChronoDuration::hours(1),
        ));
        market.delay_search(Duration::from_millis(150));
        let lease = Arc::new(InMemoryLease::new());
        let settings = RunnerSettings {
            lease_ttl: Duration::from_millis(100),
            ..Default::default()
        };
        let slow = runner_with(&market, lease.clone(), settings);
        let successor = runner_with(&market, lease.clone(), settings);
        let cancel = CancellationToken::new();

        let (first, second) = tokio::join!(slow.run(&cancel), async {
            tokio::time::sleep(Duration::from_millis(120)).await;
            successor.run(&cancel).await
        });

        assert_eq!(first.outcome, RunOutcome::LeaseLost);
        assert_eq!(first.notified, 0);
        assert_eq!(second.outcome, RunOutcome::Completed);
        assert_eq!(second.notified, 1);
        assert_eq!(market.delivered().len(), 1);
    }

    #[tokio::test]
    async fn test_lost_lease_stops_before_next_search() {
        let market = Arc::new(InMemoryMarketplace::new());
        market.add_search(saved_search("s-1", "u-1", "Porsche"));
        market.add_search(saved_search("s-2", "u-2", "Porsche"));
        market.delay_search(Duration::from_millis(150));
        let lease = Arc::new(InMemoryLease::new());
        let settings = RunnerSettings {
            lease_ttl: Duration::from_millis(100),
            ..Default::default()
        };
        let runner = runner_with(&market, lease.clone(), settings);
        let cancel = CancellationToken::new();

        let (summary, _) = tokio::join!(runner.run(&cancel), async {
            tokio::time::sleep(Duration::from_millis(120)).await;
            lease
                .try_acquire(ALERT_RUN_LEASE, "other-node", Duration::from_secs(60))
                .await
                .unwrap()
        });

        assert_eq!(summary.outcome, RunOutcome::LeaseLost);
        assert_eq!(summary.processed, 1);
        assert_eq!(lease.holder(ALERT_RUN_LEASE), Some("other-node".to_string()));
    }

    #[tokio::test]
    async fn test_unconstrained_search_matches_every_new_listing() {
        let market = Arc::new(InMemoryMarketplace::new());
        let mut search = saved_search("s-1", "u-1", "Porsche");
        search.filters = FilterFields::default();
        assert!(search.filters.is_unconstrained());
        market.add_search(search);
        let recent = Utc::now() - ChronoDuration::hours(1);
        market.add_listing(listing("v-1", "Porsche", 95_000, recent));
        market.add_listing(listing("v-2", "Dacia", 12_000, recent));

        let summary = runner(&market).run(&CancellationToken::new()).await;

        assert_eq!(summary.notified, 1);
        assert_eq!(market.delivered()[0].payload.match_count, 2);
    }

    #[test]
    fn test_summary_serializes_outcome() {
        let summary = RunSummary {
            processed: 3,
            notified: 2,
            failed: 1,
            outcome: RunOutcome::Completed,
        };
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["processed"], 3);
        assert_eq!(value["notified"], 2);
        assert_eq!(value["outcome"]["status"], "completed");

        let aborted = serde_json::to_value(RunOutcome::Aborted("boom".to_string())).unwrap();
        assert_eq!(aborted["status"], "aborted");
        assert_eq!(aborted["reason"], "boom");

        let lost = serde_json::to_value(RunOutcome::LeaseLost).unwrap();
        assert_eq!(lost["status"], "lease_lost");
    }
}
