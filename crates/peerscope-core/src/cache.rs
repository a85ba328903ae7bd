// ── Query cache ──
//
// Keyed by query fingerprint. Values are serialized `QueryOutput` JSON so
// any store that can hold strings with a TTL can back the gateway.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use crate::error::CoreError;

/// Shared result cache. Each operation is atomic per key.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CoreError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CoreError>;

    async fn expire(&self, key: &str) -> Result<(), CoreError>;
}

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process cache. Expired entries are dropped lazily on read.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| e.expires_at > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, e| e.expires_at > now);
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        let now = Instant::now();
        let hit = self
            .entries
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.value.clone());
        if hit.is_none() && self.entries.remove_if(key, |_, e| e.expires_at <= now).is_some() {
            debug!(fingerprint = key, "cache entry expired");
        }
        Ok(hit)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CoreError> {
        self.entries.insert(
            key.to_owned(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn expire(&self, key: &str) -> Result<(), CoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = MemoryCache::new();
        cache.set("abc", "{}".into(), Duration::from_secs(120)).await.unwrap();
        assert_eq!(cache.get("abc").await.unwrap().as_deref(), Some("{}"));

        tokio::time::advance(Duration::from_secs(119)).await;
        assert!(cache.get("abc").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("abc").await.unwrap(), None);
        assert_eq!(cache.entries.len(), 0);
    }

    #[tokio::test]
    async fn expire_removes_immediately() {
        let cache = MemoryCache::new();
        cache.set("abc", "1".into(), Duration::from_secs(60)).await.unwrap();
        cache.set("abc", "2".into(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("abc").await.unwrap().as_deref(), Some("2"));
        assert_eq!(cache.len(), 1);

        cache.expire("abc").await.unwrap();
        assert!(cache.is_empty());
        assert_eq!(cache.get("missing").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_only_expired() {
        let cache = MemoryCache::new();
        cache.set("short", "a".into(), Duration::from_secs(1)).await.unwrap();
        cache.set("long", "b".into(), Duration::from_secs(60)).await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;

        cache.purge_expired();
        assert_eq!(cache.entries.len(), 1);
        assert!(cache.get("long").await.unwrap().is_some());
    }
}
