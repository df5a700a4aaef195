use super::schema::MARKETPLACE_VERSIONED_SCHEMAS;
use crate::inventory::{InventorySearch, VehicleListing};
use crate::notifications::{AlertNotification, Notification, NotificationSink, NotificationType};
use crate::saved_search::{
    non_empty_list, non_empty_text, CriteriaStore, FilterFields, NewSavedSearch, SavedSearch,
};
use crate::sqlite_persistence::open_versioned;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

const SAVED_SEARCH_COLUMNS: &str =
    "id, owner_id, name, is_active, filters, created_at, last_notified_at";

const LISTING_COLUMNS: &str = "id, brand, model, price, year, mileage, body_type, fuel_type, \
     transmission, body_style, emission_standard, certified_history, engine_architecture, \
     intake_type, exterior_color, interior_color, seats, created_at";

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, notification_type, title, body, link, data, read_at, created_at";

/// SQLite-backed marketplace: saved searches, vehicle inventory and user notifications.
///
/// Implements every capability the alert runner consumes. Blocking database work runs
/// on the blocking pool so that caller-side timeouts stay effective.
#[derive(Clone)]
pub struct SqliteMarketplaceStore {
    conn: Arc<Mutex<Connection>>,
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| anyhow!("marketplace database mutex poisoned"))
}

fn row_to_saved_search(row: &rusqlite::Row) -> rusqlite::Result<SavedSearch> {
    let filters_json: String = row.get("filters")?;
    let filters = serde_json::from_str(&filters_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(SavedSearch {
        id: row.get("id")?,
        owner_id: row.get("owner_id")?,
        name: row.get("name")?,
        is_active: row.get::<_, i64>("is_active")? != 0,
        filters,
        created_at: millis_to_datetime(row.get("created_at")?),
        last_notified_at: row
            .get::<_, Option<i64>>("last_notified_at")?
            .map(millis_to_datetime),
    })
}

fn row_to_listing(row: &rusqlite::Row) -> rusqlite::Result<VehicleListing> {
    Ok(VehicleListing {
        id: row.get("id")?,
        brand: row.get("brand")?,
        model: row.get("model")?,
        price: row.get("price")?,
        year: row.get("year")?,
        mileage: row.get("mileage")?,
        body_type: row.get("body_type")?,
        fuel_type: row.get("fuel_type")?,
        transmission: row.get("transmission")?,
        body_style: row.get("body_style")?,
        emission_standard: row.get("emission_standard")?,
        certified_history: row.get::<_, i64>("certified_history")? != 0,
        engine_architecture: row.get("engine_architecture")?,
        intake_type: row.get("intake_type")?,
        exterior_color: row.get("exterior_color")?,
        interior_color: row.get("interior_color")?,
        seats: row.get("seats")?,
        created_at: millis_to_datetime(row.get("created_at")?),
    })
}

fn row_to_notification(row: &rusqlite::Row) -> rusqlite::Result<Notification> {
    let type_str: String = row.get("notification_type")?;
    let notification_type = NotificationType::parse(&type_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown notification type '{}'", type_str).into(),
        )
    })?;
    let data_json: String = row.get("data")?;

    Ok(Notification {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        notification_type,
        title: row.get("title")?,
        body: row.get("body")?,
        link: row.get("link")?,
        data: serde_json::from_str(&data_json).unwrap_or(serde_json::Value::Null),
        read_at: row.get("read_at")?,
        created_at: row.get("created_at")?,
    })
}

/// Whitespace stripped around stored text before comparison: space, tab, LF, VT, FF, CR.
const TRIMMED_WHITESPACE: &str = "char(32, 9, 10, 11, 12, 13)";

/// Listing text is stored trimmed so SQL comparisons agree with [`FilterFields::matches`],
/// which trims every Unicode whitespace.
fn trimmed(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim)
}

/// WHERE clause builder mirroring [`FilterFields::matches`].
#[derive(Default)]
struct ListingQuery {
    clauses: Vec<String>,
    values: Vec<Value>,
}

impl ListingQuery {
    fn text(&mut self, column: &str, constraint: &Option<String>) {
        if let Some(wanted) = non_empty_text(constraint) {
            self.clauses.push(format!(
                "TRIM({}, {}) COLLATE NOCASE = ?",
                column, TRIMMED_WHITESPACE
            ));
            self.values.push(Value::Text(wanted.to_string()));
        }
    }

    fn one_of(&mut self, column: &str, constraint: &Option<Vec<String>>) {
        if let Some(accepted) = non_empty_list(constraint) {
            let placeholders = vec!["?"; accepted.len()].join(", ");
            self.clauses.push(format!(
                "TRIM({}, {}) COLLATE NOCASE IN ({})",
                column, TRIMMED_WHITESPACE, placeholders
            ));
            self.values
                .extend(accepted.into_iter().map(|v| Value::Text(v.to_string())));
        }
    }

    fn compare(&mut self, column: &str, op: &str, bound: Option<i64>) {
        if let Some(bound) = bound {
            self.clauses.push(format!("{} {} ?", column, op));
            self.values.push(Value::Integer(bound));
        }
    }

    fn from_filters(filters: &FilterFields) -> Self {
        let mut query = Self::default();
        query.text("brand", &filters.brand);
        query.text("model", &filters.model);
        query.compare("price", ">=", filters.price_min);
        query.compare("price", "<=", filters.price_max);
        query.compare("year", ">=", filters.year_min.map(i64::from));
        query.compare("year", "<=", filters.year_max.map(i64::from));
        query.compare("mileage", "<=", filters.mileage_max);
        query.one_of("body_type", &filters.body_types);
        query.one_of("fuel_type", &filters.fuel_types);
        query.one_of("transmission", &filters.transmissions);
        query.text("body_style", &filters.body_style);
        query.text("emission_standard", &filters.emission_standard);
        if filters.certified_history == Some(true) {
            query.clauses.push("certified_history = 1".to_string());
        }
        query.text("engine_architecture", &filters.engine_architecture);
        query.text("intake_type", &filters.intake_type);
        query.text("exterior_color", &filters.exterior_color);
        query.text("interior_color", &filters.interior_color);
        query.compare("seats", "=", filters.seats.map(i64::from));
        query
    }

    fn sql(&self) -> String {
        let mut sql = format!("SELECT {} FROM vehicle_listings", LISTING_COLUMNS);
        if !self.clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at DESC, id");
        sql
    }
}

fn search_listings(conn: &Connection, filters: &FilterFields) -> Result<Vec<VehicleListing>> {
    let query = ListingQuery::from_filters(filters);
    let mut stmt = conn.prepare(&query.sql())?;
    let listings = stmt
        .query_map(params_from_iter(query.values.iter()), row_to_listing)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(listings)
}

fn list_active_searches(conn: &Connection) -> Result<Vec<SavedSearch>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM saved_searches WHERE is_active = 1 ORDER BY created_at, id",
        SAVED_SEARCH_COLUMNS
    ))?;
    let searches = stmt
        .query_map([], row_to_saved_search)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(searches)
}

fn advance_watermark(conn: &Connection, search_id: &str, notified_at: DateTime<Utc>) -> Result<()> {
    let ms = notified_at.timestamp_millis();
    let updated = conn.execute(
        "UPDATE saved_searches SET last_notified_at = ?1
         WHERE id = ?2 AND (last_notified_at IS NULL OR last_notified_at < ?1)",
        params![ms, search_id],
    )?;
    if updated == 0 {
        let exists = conn
            .query_row(
                "SELECT 1 FROM saved_searches WHERE id = ?1",
                params![search_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !exists {
            bail!("Saved search {} not found", search_id);
        }
        debug!(
            "Watermark for saved search {} already at or past {}",
            search_id, notified_at
        );
    }
    Ok(())
}

fn insert_notification(conn: &Connection, alert: &AlertNotification) -> Result<Notification> {
    let notification = Notification {
        id: Uuid::new_v4().to_string(),
        user_id: alert.recipient_id.clone(),
        notification_type: alert.category,
        title: alert.title.clone(),
        body: Some(alert.body.clone()),
        link: Some(alert.link.clone()),
        data: serde_json::to_value(&alert.payload)?,
        read_at: None,
        created_at: Utc::now().timestamp_millis(),
    };

    conn.execute(
        &format!(
            "INSERT INTO notifications ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            NOTIFICATION_COLUMNS
        ),
        params![
            notification.id,
            notification.user_id,
            notification.notification_type.as_str(),
            notification.title,
            notification.body,
            notification.link,
            notification.data.to_string(),
            notification.read_at,
            notification.created_at,
        ],
    )
    .context("Failed to insert notification")?;

    Ok(notification)
}

impl SqliteMarketplaceStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned(db_path.as_ref(), MARKETPLACE_VERSIONED_SCHEMAS, "marketplace")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            f(&conn)
        })
        .await
        .context("Marketplace database task failed")?
    }

    // Saved searches

    pub fn create_search(&self, new_search: NewSavedSearch) -> Result<SavedSearch> {
        if new_search.owner_id.trim().is_empty() {
            bail!("A saved search needs an owner");
        }
        let search = SavedSearch {
            id: Uuid::new_v4().to_string(),
            owner_id: new_search.owner_id,
            name: new_search.name,
            is_active: true,
            filters: new_search.filters,
            created_at: Utc::now(),
            last_notified_at: None,
        };

        let conn = lock(&self.conn)?;
        conn.execute(
            &format!(
                "INSERT INTO saved_searches ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                SAVED_SEARCH_COLUMNS
            ),
            params![
                search.id,
                search.owner_id,
                search.name,
                search.is_active as i64,
                serde_json::to_string(&search.filters)?,
                search.created_at.timestamp_millis(),
                Option::<i64>::None,
            ],
        )
        .context("Failed to insert saved search")?;

        Ok(search)
    }

    pub fn get_search(&self, id: &str) -> Result<Option<SavedSearch>> {
        let conn = lock(&self.conn)?;
        let search = conn
            .query_row(
                &format!("SELECT {} FROM saved_searches WHERE id = ?1", SAVED_SEARCH_COLUMNS),
                params![id],
                row_to_saved_search,
            )
            .optional()?;
        Ok(search)
    }

    pub fn list_searches_for_owner(&self, owner_id: &str) -> Result<Vec<SavedSearch>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM saved_searches WHERE owner_id = ?1 ORDER BY created_at DESC",
            SAVED_SEARCH_COLUMNS
        ))?;
        let searches = stmt
            .query_map(params![owner_id], row_to_saved_search)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(searches)
    }

    /// Returns false when the search does not exist.
    pub fn set_search_active(&self, id: &str, is_active: bool) -> Result<bool> {
        let conn = lock(&self.conn)?;
        let updated = conn.execute(
            "UPDATE saved_searches SET is_active = ?1 WHERE id = ?2",
            params![is_active as i64, id],
        )?;
        Ok(updated > 0)
    }

    /// Replaces the filters. The watermark is kept, so listings already reported under
    /// the previous filters are not reported again.
    pub fn update_search_filters(&self, id: &str, filters: &FilterFields) -> Result<bool> {
        let conn = lock(&self.conn)?;
        let updated = conn.execute(
            "UPDATE saved_searches SET filters = ?1 WHERE id = ?2",
            params![serde_json::to_string(filters)?, id],
        )?;
        Ok(updated > 0)
    }

    pub fn delete_search(&self, id: &str) -> Result<bool> {
        let conn = lock(&self.conn)?;
        let deleted = conn.execute("DELETE FROM saved_searches WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    // Inventory

    pub fn insert_listing(&self, listing: &VehicleListing) -> Result<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            &format!(
                "INSERT INTO vehicle_listings ({}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
                LISTING_COLUMNS
            ),
            params![
                listing.id,
                listing.brand.trim(),
                listing.model.trim(),
                listing.price,
                listing.year,
                listing.mileage,
                trimmed(&listing.body_type),
                trimmed(&listing.fuel_type),
                trimmed(&listing.transmission),
                trimmed(&listing.body_style),
                trimmed(&listing.emission_standard),
                listing.certified_history as i64,
                trimmed(&listing.engine_architecture),
                trimmed(&listing.intake_type),
                trimmed(&listing.exterior_color),
                trimmed(&listing.interior_color),
                listing.seats,
                listing.created_at.timestamp_millis(),
            ],
        )
        .with_context(|| format!("Failed to insert listing {}", listing.id))?;
        Ok(())
    }

    // Notifications

    /// Most recent first.
    pub fn list_notifications(&self, user_id: &str, limit: usize) -> Result<Vec<Notification>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM notifications WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
            NOTIFICATION_COLUMNS
        ))?;
        let notifications = stmt
            .query_map(params![user_id, limit as i64], row_to_notification)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notifications)
    }

    pub fn unread_count(&self, user_id: &str) -> Result<usize> {
        let conn = lock(&self.conn)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read_at IS NULL",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Returns false when `user_id` has no unread notification with that id.
    pub fn mark_notification_read(&self, notification_id: &str, user_id: &str) -> Result<bool> {
        let conn = lock(&self.conn)?;
        let updated = conn.execute(
            "UPDATE notifications SET read_at = ?1
             WHERE id = ?2 AND user_id = ?3 AND read_at IS NULL",
            params![Utc::now().timestamp_millis(), notification_id, user_id],
        )?;
        Ok(updated > 0)
    }
}

#[async_trait]
impl CriteriaStore for SqliteMarketplaceStore {
    async fn list_active(&self) -> Result<Vec<SavedSearch>> {
        self.with_conn(list_active_searches).await
    }

    async fn set_last_notified(&self, search_id: &str, notified_at: DateTime<Utc>) -> Result<()> {
        let search_id = search_id.to_string();
        self.with_conn(move |conn| advance_watermark(conn, &search_id, notified_at))
            .await
    }
}

#[async_trait]
impl InventorySearch for SqliteMarketplaceStore {
    async fn search(&self, filters: &FilterFields) -> Result<Vec<VehicleListing>> {
        let filters = filters.clone();
        self.with_conn(move |conn| search_listings(conn, &filters))
            .await
    }
}

#[async_trait]
impl NotificationSink for SqliteMarketplaceStore {
    async fn deliver(&self, alert: &AlertNotification) -> Result<Notification> {
        let alert = alert.clone();
        self.with_conn(move |conn| insert_notification(conn, &alert))
            .await
    }
}
