//! In-memory marketplace backing all three alert capabilities.
//!
//! Used by tests and local dry runs. Failures and latency can be injected per
//! collaborator call.

use crate::inventory::{InventorySearch, VehicleListing};
use crate::notifications::{AlertNotification, Notification, NotificationSink};
use crate::saved_search::{CriteriaStore, FilterFields, SavedSearch};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
struct Failures {
    list_active: bool,
    search_brands: HashSet<String>,
    recipients: HashSet<String>,
    watermark_ids: HashSet<String>,
    search_delay: Option<Duration>,
}

#[derive(Default)]
struct State {
    searches: Vec<SavedSearch>,
    listings: Vec<VehicleListing>,
    delivered: Vec<AlertNotification>,
    failures: Failures,
}

#[derive(Default)]
pub struct InMemoryMarketplace {
    state: Mutex<State>,
}

impl InMemoryMarketplace {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("in-memory marketplace mutex poisoned"))
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_search(&self, search: SavedSearch) {
        self.state().searches.push(search);
    }

    pub fn add_listing(&self, listing: VehicleListing) {
        self.state().listings.push(listing);
    }

    pub fn search_by_id(&self, id: &str) -> Option<SavedSearch> {
        self.state().searches.iter().find(|s| s.id == id).cloned()
    }

    pub fn watermark(&self, id: &str) -> Option<DateTime<Utc>> {
        self.search_by_id(id).and_then(|s| s.last_notified_at)
    }

    /// Every alert accepted so far, in delivery order.
    pub fn delivered(&self) -> Vec<AlertNotification> {
        self.state().delivered.clone()
    }

    pub fn fail_list_active(&self) {
        self.state().failures.list_active = true;
    }

    pub fn fail_search_for_brand(&self, brand: &str) {
        self.state()
            .failures
            .search_brands
            .insert(brand.to_lowercase());
    }

    pub fn fail_delivery_to(&self, recipient_id: &str) {
        self.state()
            .failures
            .recipients
            .insert(recipient_id.to_string());
    }

    pub fn fail_watermark_for(&self, search_id: &str) {
        self.state()
            .failures
            .watermark_ids
            .insert(search_id.to_string());
    }

    pub fn delay_search(&self, delay: Duration) {
        self.state().failures.search_delay = Some(delay);
    }

    pub fn clear_failures(&self) {
        self.state().failures = Failures::default();
    }
}

#[async_trait]
impl CriteriaStore for InMemoryMarketplace {
    async fn list_active(&self) -> Result<Vec<SavedSearch>> {
        let state = self.lock()?;
        if state.failures.list_active {
            bail!("saved search store unavailable");
        }
        Ok(state
            .searches
            .iter()
            .filter(|s| s.is_active)
            .cloned()
            .collect())
    }

    async fn set_last_notified(&self, search_id: &str, notified_at: DateTime<Utc>) -> Result<()> {
        let mut state = self.lock()?;
        if state.failures.watermark_ids.contains(search_id) {
            bail!("watermark write rejected for saved search {}", search_id);
        }
        let search = state
            .searches
            .iter_mut()
            .find(|s| s.id == search_id)
            .ok_or_else(|| anyhow!("Saved search {} not found", search_id))?;
        if search.last_notified_at.map_or(true, |current| current < notified_at) {
            search.last_notified_at = Some(notified_at);
        }
        Ok(())
    }
}

#[async_trait]
impl InventorySearch for InMemoryMarketplace {
    async fn search(&self, filters: &FilterFields) -> Result<Vec<VehicleListing>> {
        let delay = {
            let state = self.lock()?;
            let failing = filters
                .brand
                .as_deref()
                .is_some_and(|b| state.failures.search_brands.contains(&b.to_lowercase()));
            if failing {
                bail!("inventory backend error");
            }
            state.failures.search_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.lock()?;
        let mut found: Vec<VehicleListing> = state
            .listings
            .iter()
            .filter(|l| filters.matches(l))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}

#[async_trait]
impl NotificationSink for InMemoryMarketplace {
    async fn deliver(&self, alert: &AlertNotification) -> Result<Notification> {
        let mut state = self.lock()?;
        if state.failures.recipients.contains(&alert.recipient_id) {
            bail!("push gateway refused recipient {}", alert.recipient_id);
        }
        state.delivered.push(alert.clone());

        Ok(Notification {
            id: Uuid::new_v4().to_string(),
            user_id: alert.recipient_id.clone(),
            notification_type: alert.category,
            title: alert.title.clone(),
            body: Some(alert.body.clone()),
            link: Some(alert.link.clone()),
            data: serde_json::to_value(&alert.payload)?,
            read_at: None,
            created_at: Utc::now().timestamp_millis(),
        })
    }
}
