mod in_memory;
mod schema;
mod sqlite_marketplace_store;

pub use in_memory::InMemoryMarketplace;
pub use schema::MARKETPLACE_VERSIONED_SCHEMAS;
pub use sqlite_marketplace_store::SqliteMarketplaceStore;
