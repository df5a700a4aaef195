//! User notifications module

mod models;

pub use models::{AlertNotification, Notification, NotificationType, SavedSearchAlertData};

use anyhow::Result;
use async_trait::async_trait;

/// Notification delivery capability.
///
/// A successful return means the notification is durably recorded for the recipient;
/// the alert engine relies on this before advancing any watermark.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, alert: &AlertNotification) -> Result<Notification>;
}
