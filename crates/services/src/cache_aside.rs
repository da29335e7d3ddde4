//! Typed cache-aside helpers over the `Cache` port.
//!
//! Every failure here is logged and swallowed: the cache only ever makes a
//! request faster, never makes it fail.

use std::sync::Arc;
use std::time::Duration;

use domains::ports::Cache;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const KEY_STATS: &str = "stats:global";
pub const PREFIX_STORIES_LIST: &str = "stories:list:";

pub fn stories_list_key(page: i64, per_page: i64) -> String {
    format!("{PREFIX_STORIES_LIST}{page}:{per_page}")
}

pub fn story_key(id: &uuid::Uuid) -> String {
    format!("story:{id}")
}

/// A value plus whether it came out of the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    pub hit: bool,
}

impl<T> Cached<T> {
    pub fn hit(value: T) -> Self {
        Self { value, hit: true }
    }

    pub fn miss(value: T) -> Self {
        Self { value, hit: false }
    }
}

#[derive(Clone)]
pub struct CacheAside {
    cache: Arc<dyn Cache>,
}

impl CacheAside {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(key, error = %e, "discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache read failed, falling back to store");
                None
            }
        }
    }

    pub async fn put<T: Serialize + Sync>(&self, key: &str, value: &T, ttl: Duration) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to encode cache entry");
                return;
            }
        };
        if let Err(e) = self.cache.set(key, raw, ttl).await {
            tracing::warn!(key, error = %e, "failed to populate cache");
        }
    }

    /// Drops every listing page and the global stats entry.
    pub async fn invalidate_listings(&self) {
        if let Err(e) = self.cache.delete_prefix(PREFIX_STORIES_LIST).await {
            tracing::warn!(error = %e, "failed to invalidate stories list cache");
        }
        if let Err(e) = self.cache.delete(KEY_STATS).await {
            tracing::warn!(error = %e, "failed to invalidate stats cache");
        }
    }

    /// Drops one story entry plus everything `invalidate_listings` drops.
    pub async fn invalidate_story(&self, id: &uuid::Uuid) {
        let key = story_key(id);
        if let Err(e) = self.cache.delete(&key).await {
            tracing::warn!(key, error = %e, "failed to invalidate story cache");
        }
        self.invalidate_listings().await;
    }

    pub async fn healthy(&self) -> bool {
        self.cache.healthy().await
    }
}
