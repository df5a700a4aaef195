//! Watermark advancement rules.

use crate::inventory::VehicleListing;
use crate::saved_search::SavedSearch;
use chrono::{DateTime, Duration, Utc};

/// Milliseconds subtracted from the observation instant. Stores keep millisecond precision, so a
/// listing stamped in the same millisecond as the query but inserted after it must still
/// sit strictly above the stored watermark.
pub const OBSERVATION_MARGIN_MS: i64 = 1;

/// Watermark to store once `delivered` has been durably notified.
///
/// `observed_at` is the instant captured right before the inventory was queried. Taking
/// the later of that instant (minus [`OBSERVATION_MARGIN_MS`]) and the newest delivered
/// listing guarantees every delivered listing sits at or below the new watermark, while
/// listings inserted after the query stay above it, even once truncated to milliseconds.
/// The result never precedes the current watermark.
pub fn next_watermark(
    search: &SavedSearch,
    delivered: &[VehicleListing],
    observed_at: DateTime<Utc>,
) -> DateTime<Utc> {
    let newest_delivered = delivered.iter().map(|l| l.created_at).max();

    let observed_floor = observed_at - Duration::milliseconds(OBSERVATION_MARGIN_MS);

    [Some(observed_floor), newest_delivered, search.last_notified_at]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(observed_floor)
}
