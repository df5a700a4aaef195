//! Selection of listings that have not been reported yet.

use crate::inventory::VehicleListing;
use crate::saved_search::SavedSearch;

/// Returns the listings created strictly after the search's watermark.
///
/// A search that was never notified uses its own creation time as the floor, so
/// listings that existed before the search was saved are never reported. Input order
/// (most recent first) is preserved.
pub fn new_matches(search: &SavedSearch, matches: Vec<VehicleListing>) -> Vec<VehicleListing> {
    let floor = search.freshness_floor();
    matches
        .into_iter()
        .filter(|listing| listing.created_at > floor)
        .collect()
}
