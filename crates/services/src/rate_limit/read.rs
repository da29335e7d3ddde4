//! Token Bucket Rate Limiter for anonymous reads.
//!
//! One bucket per client address. Tokens refill continuously; each request
//! consumes one. The table is bounded by wholesale eviction: an evicted
//! address gets a fresh, full bucket on its next request.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadLimitConfig {
    /// Sustained requests per minute per address.
    pub requests_per_minute: u32,
    /// Bucket capacity.
    pub burst: u32,
    /// Table size above which `evict_if_oversized` clears every bucket.
    pub table_ceiling: usize,
}

impl ReadLimitConfig {
    /// Burst of a tenth of the per-minute rate, never below one.
    pub fn from_rpm(requests_per_minute: u32, table_ceiling: usize) -> Self {
        Self {
            requests_per_minute,
            burst: (requests_per_minute / 10).max(1),
            table_ceiling,
        }
    }

    fn refill_per_sec(&self) -> f64 {
        f64::from(self.requests_per_minute) / 60.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReadDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

impl ReadDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, ReadDecision::Allowed { .. })
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

pub struct ReadLimiter {
    config: ReadLimitConfig,
    buckets: DashMap<String, Arc<Mutex<Bucket>>>,
}

impl ReadLimiter {
    pub fn new(config: ReadLimitConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
        }
    }

    pub fn check(&self, address: &str) -> ReadDecision {
        self.check_at(address, Instant::now())
    }

    pub fn check_at(&self, address: &str, now: Instant) -> ReadDecision {
        let capacity = f64::from(self.config.burst);
        let rate = self.config.refill_per_sec();

        // The shard lock is held only for the create-or-fetch step.
        let bucket = self
            .buckets
            .entry(address.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(Bucket {
                    tokens: capacity,
                    last_refill: now,
                }))
            })
            .clone();

        let mut bucket = match bucket.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let elapsed = now.saturating_duration_since(bucket.last_refill);
        bucket.tokens = (bucket.tokens + elapsed.as_secs_f64() * rate).min(capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            ReadDecision::Allowed {
                remaining: bucket.tokens.floor() as u32,
            }
        } else {
            let wait = if rate > 0.0 {
                (1.0 - bucket.tokens) / rate
            } else {
                60.0
            };
            ReadDecision::Limited {
                retry_after: Duration::from_secs_f64(wait.max(0.0)),
            }
        }
    }

    pub fn tracked_addresses(&self) -> usize {
        self.buckets.len()
    }

    /// Clears the whole table once it grows past the ceiling.
    /// Returns how many buckets were dropped.
    pub fn evict_if_oversized(&self) -> usize {
        let size = self.buckets.len();
        if size <= self.config.table_ceiling {
            return 0;
        }
        self.buckets.clear();
        tracing::info!(evicted = size, "reader rate-limit table reset");
        size
    }
}
