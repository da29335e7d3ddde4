//! Redis-backed cache over a deadpool connection pool.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use domains::error::CacheError;
use domains::ports::Cache;

const SCAN_BATCH: usize = 100;

pub struct RedisCache {
    pool: Pool,
}

impl RedisCache {
    /// Builds the pool and checks the server answers `PING`.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let pool = Config::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::Backend(format!("failed to create redis pool: {e}")))?;
        let cache = Self { pool };

        let mut conn = cache.conn().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| CacheError::Backend(format!("redis ping failed: {e}")))?;

        tracing::info!("redis cache connected");
        Ok(cache)
    }

    async fn conn(&self) -> Result<Connection, CacheError> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Backend(format!("redis pool: {e}")))
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn().await?;
        redis::cmd("GET")
            .arg(key)
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(|e| CacheError::Backend(format!("redis GET {key}: {e}")))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CacheError::Backend(format!("redis SET {key}: {e}")))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        redis::cmd("DEL")
            .arg(key)
            .query_async::<i64>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| CacheError::Backend(format!("redis DEL {key}: {e}")))
    }

    /// Walks the keyspace with `SCAN` so the server is never blocked by `KEYS`.
    async fn delete_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        let pattern = format!("{prefix}*");
        let mut cursor: u64 = 0;
        let mut deleted = 0usize;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| CacheError::Backend(format!("redis SCAN {pattern}: {e}")))?;

            if !keys.is_empty() {
                deleted += keys.len();
                redis::cmd("DEL")
                    .arg(&keys)
                    .query_async::<i64>(&mut conn)
                    .await
                    .map_err(|e| CacheError::Backend(format!("redis DEL {pattern}: {e}")))?;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }
        tracing::debug!(prefix, deleted, "invalidated cache prefix");
        Ok(())
    }

    async fn healthy(&self) -> bool {
        let Ok(mut conn) = self.conn().await else {
            return false;
        };
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok()
    }
}
