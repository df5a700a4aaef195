//! Single-run lease guarding the batch runner against overlapping invocations.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Name under which the alert runner takes its lease.
pub const ALERT_RUN_LEASE: &str = "saved_search_alerts";

/// A named, expiring mutual-exclusion lease.
///
/// `try_acquire` succeeds when the lease is free, expired, or already held by `holder`
/// (which renews it). `release` is a no-op unless `holder` owns the lease.
#[async_trait]
pub trait RunLease: Send + Sync {
    async fn try_acquire(&self, name: &str, holder: &str, ttl: Duration) -> Result<bool>;
    async fn release(&self, name: &str, holder: &str) -> Result<()>;
}

/// Process-local lease, for single-process deployments and tests.
#[derive(Default)]
pub struct InMemoryLease {
    leases: Mutex<HashMap<String, (String, DateTime<Utc>)>>,
}

impl InMemoryLease {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn holder(&self, name: &str) -> Option<String> {
        let leases = self.leases.lock().ok()?;
        leases
            .get(name)
            .filter(|(_, expires_at)| *expires_at > Utc::now())
            .map(|(holder, _)| holder.clone())
    }
}

#[async_trait]
impl RunLease for InMemoryLease {
    async fn try_acquire(&self, name: &str, holder: &str, ttl: Duration) -> Result<bool> {
        let now = Utc::now();
        let mut leases = self
            .leases
            .lock()
            .map_err(|_| anyhow::anyhow!("lease table mutex poisoned"))?;

        if let Some((current, expires_at)) = leases.get(name) {
            if current != holder && *expires_at > now {
                return Ok(false);
            }
        }

        let expires_at = now + chrono::Duration::from_std(ttl)?;
        leases.insert(name.to_string(), (holder.to_string(), expires_at));
        Ok(true)
    }

    async fn release(&self, name: &str, holder: &str) -> Result<()> {
        let mut leases = self
            .leases
            .lock()
            .map_err(|_| anyhow::anyhow!("lease table mutex poisoned"))?;
        if leases.get(name).is_some_and(|(current, _)| current == holder) {
            leases.remove(name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_holder_is_refused() {
        let lease = InMemoryLease::new();
        let ttl = Duration::from_secs(60);

        assert!(lease.try_acquire("job", "a", ttl).await.unwrap());
        assert!(!lease.try_acquire("job", "b", ttl).await.unwrap());
        assert_eq!(lease.holder("job"), Some("a".to_string()));
    }

    #[tokio::test]
    async fn test_same_holder_renews() {
        let lease = InMemoryLease::new();
        let ttl = Duration::from_secs(60);

        assert!(lease.try_acquire("job", "a", ttl).await.unwrap());
        assert!(lease.try_acquire("job", "a", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_frees_lease() {
        let lease = InMemoryLease::new();
        let ttl = Duration::from_secs(60);

        lease.try_acquire("job", "a", ttl).await.unwrap();
        lease.release("job", "b").await.unwrap();
        assert_eq!(lease.holder("job"), Some("a".to_string()));

        lease.release("job", "a").await.unwrap();
        assert!(lease.holder("job").is_none());
        assert!(lease.try_acquire("job", "b", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_lease_can_be_taken_over() {
        let lease = InMemoryLease::new();

        assert!(lease
            .try_acquire("job", "a", Duration::from_millis(0))
            .await
            .unwrap());
        assert!(lease
            .try_acquire("job", "b", Duration::from_secs(60))
            .await
            .unwrap());
        assert_eq!(lease.holder("job"), Some("b".to_string()));
    }
}
