//! Sentinelle library
//!
//! Saved-search alert engine for the vehicle marketplace. The binary wires these modules
//! together; they are exposed here for integration tests.

pub mod alerts;
pub mod background_jobs;
pub mod config;
pub mod inventory;
pub mod marketplace_store;
pub mod metrics;
pub mod notifications;
pub mod saved_search;
pub mod server_store;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use alerts::{AlertRunner, RunOutcome, RunSummary, RunnerSettings};
pub use marketplace_store::{InMemoryMarketplace, SqliteMarketplaceStore};
pub use server_store::{ServerStore, ServerStoreLease, SqliteServerStore};
