//! Shared constants for end-to-end tests

// ============================================================================
// Owners
// ============================================================================

pub const OWNER_1: &str = "user-claire";

pub const OWNER_2: &str = "user-marc";

// ============================================================================
// Listings
// ============================================================================

pub const BRAND_PEUGEOT: &str = "Peugeot";

pub const BRAND_RENAULT: &str = "Renault";

/// Search page path configured for the test runner.
pub const SEARCH_PAGE_PATH: &str = "/occasions";
