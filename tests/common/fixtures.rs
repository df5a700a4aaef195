//! Test fixture creation
//!
//! Each [`TestEnv`] owns a temporary directory with a fresh marketplace.db and server.db.

use super::constants::SEARCH_PAGE_PATH;
use chrono::Duration;
use sentinelle::alerts::{AlertComposer, AlertRunner, RunnerSettings};
use sentinelle::inventory::VehicleListing;
use sentinelle::saved_search::{FilterFields, NewSavedSearch, SavedSearch};
use sentinelle::server_store::{ServerStore, ServerStoreLease, SqliteServerStore};
use sentinelle::SqliteMarketplaceStore;
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestEnv {
    pub marketplace: Arc<SqliteMarketplaceStore>,
    pub server_store: Arc<dyn ServerStore>,
    pub temp_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let marketplace = Arc::new(
            SqliteMarketplaceStore::new(temp_dir.path().join("marketplace.db"))
                .expect("Failed to open marketplace db"),
        );
        let server_store: Arc<dyn ServerStore> = Arc::new(
            SqliteServerStore::new(temp_dir.path().join("server.db"))
                .expect("Failed to open server db"),
        );
        Self {
            marketplace,
            server_store,
            temp_dir,
        }
    }

    /// Runner over the SQLite stores, leased through server.db.
    pub fn runner(&self) -> AlertRunner {
        AlertRunner::new(
            self.marketplace.clone(),
            self.marketplace.clone(),
            self.marketplace.clone(),
            Arc::new(ServerStoreLease::new(self.server_store.clone())),
            AlertComposer::new(SEARCH_PAGE_PATH),
            RunnerSettings::default(),
        )
    }

    pub fn create_search(&self, owner: &str, name: Option<&str>, filters: FilterFields) -> SavedSearch {
        self.marketplace
            .create_search(NewSavedSearch {
                owner_id: owner.to_string(),
                name: name.map(str::to_string),
                filters,
            })
            .expect("Failed to create saved search")
    }

    pub fn insert(&self, listing: VehicleListing) {
        self.marketplace
            .insert_listing(&listing)
            .expect("Failed to insert listing");
    }
}

/// A listing created `seconds` after `search` was saved.
pub fn listing_after(
    search: &SavedSearch,
    seconds: i64,
    id: &str,
    brand: &str,
    model: &str,
    price: i64,
) -> VehicleListing {
    VehicleListing::new(id, brand, model, price, search.created_at + Duration::seconds(seconds))
}
