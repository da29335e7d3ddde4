use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use domains::error::CacheError;
use domains::ports::Cache;

struct Entry {
    value: String,
    expires_at: Instant,
}

/// Writes between full sweeps of expired entries.
const SWEEP_EVERY: usize = 64;

/// Process-local TTL cache. Expired entries are dropped on read and by a
/// sweep every [`SWEEP_EVERY`] writes.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
    writes: AtomicUsize,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, e| e.expires_at > now);
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.value.clone()));
            }
        }
        self.entries.remove_if(key, |_, e| e.expires_at <= now);
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        if (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_EVERY == 0 {
            self.purge_expired();
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        self.entries.retain(|k, _| !k.starts_with(prefix));
        Ok(())
    }

    async fn healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get() {
        let cache = MemoryCache::new();
        cache.set("story:1", "{}".into(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("story:1").await.unwrap().as_deref(), Some("{}"));
        assert_eq!(cache.get("story:2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entries_are_misses() {
        let cache = MemoryCache::new();
        cache.set("k", "v".into(), Duration::ZERO).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn prefix_delete_spares_other_keys() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set("stories:list:1:30", "a".into(), ttl).await.unwrap();
        cache.set("stories:list:2:30", "b".into(), ttl).await.unwrap();
        cache.set("story:abc", "c".into(), ttl).await.unwrap();

        cache.delete_prefix("stories:list:").await.unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.get("story:abc").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unread_expired_entries_are_swept_on_write() {
        let cache = MemoryCache::new();
        cache.set("story:live", "x".into(), Duration::from_secs(60)).await.unwrap();
        for i in 0..1_000 {
            cache.set(&format!("stories:list:{i}:30"), "[]".into(), Duration::ZERO).await.unwrap();
        }
        assert!(cache.len() <= SWEEP_EVERY);
        assert_eq!(cache.get("story:live").await.unwrap().as_deref(), Some("x"));
    }
}
