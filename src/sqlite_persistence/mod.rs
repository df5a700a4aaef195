mod versioned_schema;

pub use versioned_schema::*;

/// Offset added to every schema version stored in `PRAGMA user_version`, so that
/// databases created by this crate are distinguishable from foreign SQLite files.
pub const BASE_DB_VERSION: usize = 7300;
