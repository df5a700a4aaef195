//! SQLite schema for the marketplace database.
//!
//! Timestamps are unix milliseconds. Saved-search filters are stored as JSON text.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

const SAVED_SEARCHES_TABLE_V1: Table = Table {
    name: "saved_searches",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("owner_id", &SqlType::Text, non_null = true),
        sqlite_column!("name", &SqlType::Text),
        sqlite_column!(
            "is_active",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("1")
        ),
        sqlite_column!("filters", &SqlType::Text, non_null = true),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
        sqlite_column!("last_notified_at", &SqlType::Integer),
    ],
    indices: &[
        ("idx_saved_searches_owner", "owner_id"),
        ("idx_saved_searches_active", "is_active"),
    ],
};

const VEHICLE_LISTINGS_TABLE_V1: Table = Table {
    name: "vehicle_listings",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("brand", &SqlType::Text, non_null = true),
        sqlite_column!("model", &SqlType::Text, non_null = true),
        sqlite_column!("price", &SqlType::Integer, non_null = true),
        sqlite_column!("year", &SqlType::Integer),
        sqlite_column!("mileage", &SqlType::Integer),
        sqlite_column!("body_type", &SqlType::Text),
        sqlite_column!("fuel_type", &SqlType::Text),
        sqlite_column!("transmission", &SqlType::Text),
        sqlite_column!("body_style", &SqlType::Text),
        sqlite_column!("emission_standard", &SqlType::Text),
        sqlite_column!(
            "certified_history",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("engine_architecture", &SqlType::Text),
        sqlite_column!("intake_type", &SqlType::Text),
        sqlite_column!("exterior_color", &SqlType::Text),
        sqlite_column!("interior_color", &SqlType::Text),
        sqlite_column!("seats", &SqlType::Integer),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[
        ("idx_vehicle_listings_created_at", "created_at DESC"),
        ("idx_vehicle_listings_brand", "brand COLLATE NOCASE"),
    ],
};

const NOTIFICATIONS_TABLE_V1: Table = Table {
    name: "notifications",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("user_id", &SqlType::Text, non_null = true),
        sqlite_column!("notification_type", &SqlType::Text, non_null = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("body", &SqlType::Text),
        sqlite_column!("link", &SqlType::Text),
        sqlite_column!("data", &SqlType::Text, non_null = true),
        sqlite_column!("read_at", &SqlType::Integer),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_notifications_user_created", "user_id, created_at DESC")],
};

pub static MARKETPLACE_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[
        SAVED_SEARCHES_TABLE_V1,
        VEHICLE_LISTINGS_TABLE_V1,
        NOTIFICATIONS_TABLE_V1,
    ],
    migration: None,
}];
