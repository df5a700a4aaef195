use super::ServerStore;
use crate::alerts::RunLease;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// [`RunLease`] persisted in the server database, shared by every process using it.
pub struct ServerStoreLease {
    server_store: Arc<dyn ServerStore>,
}

impl ServerStoreLease {
    pub fn new(server_store: Arc<dyn ServerStore>) -> Self {
        Self { server_store }
    }
}

#[async_trait]
impl RunLease for ServerStoreLease {
    async fn try_acquire(&self, name: &str, holder: &str, ttl: Duration) -> Result<bool> {
        let store = Arc::clone(&self.server_store);
        let (name, holder) = (name.to_string(), holder.to_string());
        tokio::task::spawn_blocking(move || store.try_acquire_lease(&name, &holder, ttl))
            .await
            .context("Lease task failed")?
    }

    async fn release(&self, name: &str, holder: &str) -> Result<()> {
        let store = Arc::clone(&self.server_store);
        let (name, holder) = (name.to_string(), holder.to_string());
        let released = tokio::task::spawn_blocking(move || store.release_lease(&name, &holder))
            .await
            .context("Lease task failed")??;
        if !released {
            debug!("Lease was already gone or taken over at release time");
        }
        Ok(())
    }
}
