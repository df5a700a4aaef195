//! Notification data models

use serde::{Deserialize, Serialize};

/// Notification category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    SavedSearchAlert,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::SavedSearchAlert => "saved_search_alert",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "saved_search_alert" => Some(NotificationType::SavedSearchAlert),
            _ => None,
        }
    }
}

/// A persisted user notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub notification_type: NotificationType,
    pub title: String,
    pub body: Option<String>,
    pub link: Option<String>,
    pub data: serde_json::Value,
    pub read_at: Option<i64>,
    pub created_at: i64,
}

/// Payload attached to saved-search alerts, used for click-through and read tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSearchAlertData {
    pub action: String,
    pub search_id: String,
    pub match_count: usize,
    /// Every matched listing, not only the ones shown in the body.
    pub vehicle_ids: Vec<String>,
}

/// A notification ready to hand over to a [`super::NotificationSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct AlertNotification {
    pub recipient_id: String,
    pub title: String,
    pub body: String,
    pub category: NotificationType,
    pub link: String,
    pub payload: SavedSearchAlertData,
}
