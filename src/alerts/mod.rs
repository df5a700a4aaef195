//! Saved-search alert engine.
//!
//! For each active saved search: query the inventory, keep the listings created after
//! the search's watermark, deliver one grouped notification, then advance the watermark.

mod composer;
mod error;
mod freshness;
mod lease;
mod runner;
mod watermark;

pub use composer::{
    filter_query, format_price_eur, AlertComposer, ALERT_ACTION, ALERT_MARKER,
    DEFAULT_SEARCH_PAGE_PATH, MAX_LISTED_MATCHES,
};
pub use error::{AlertError, AlertStage};
pub use freshness::new_matches;
pub use lease::{InMemoryLease, RunLease, ALERT_RUN_LEASE};
pub use runner::{AlertRunner, RunOutcome, RunSummary, RunnerSettings};
pub use watermark::next_watermark;
