//! Marketplace inventory, consumed read-only by the alert engine.

mod models;

pub use models::VehicleListing;

use crate::saved_search::FilterFields;
use anyhow::Result;
use async_trait::async_trait;

/// Inventory search capability.
///
/// Returns every listing currently satisfying all non-empty constraints of `filters`,
/// most recently created first. Absent fields are wildcards and list-valued fields
/// match by membership (see [`FilterFields::matches`]).
#[async_trait]
pub trait InventorySearch: Send + Sync {
    async fn search(&self, filters: &FilterFields) -> Result<Vec<VehicleListing>>;
}
