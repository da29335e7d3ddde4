//! Sliding-window limiter for authenticated writes.
//!
//! Counts write-log entries for an identity inside the trailing window. The
//! same window is handed to the store so the transaction that appends the
//! next entry re-checks it under a row lock.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use domains::error::{DomainError, Result};
use domains::models::{AdmissionWindow, WriteAction};
use domains::ports::RateLimitRepository;
use uuid::Uuid;

pub struct WriteLimiter {
    log: Arc<dyn RateLimitRepository>,
    window: AdmissionWindow,
}

impl WriteLimiter {
    pub fn new(log: Arc<dyn RateLimitRepository>, max_actions: i64, window: Duration) -> Self {
        Self {
            log,
            window: AdmissionWindow {
                action: WriteAction::CreateStory,
                max_actions,
                window,
            },
        }
    }

    pub fn window(&self) -> AdmissionWindow {
        self.window
    }

    /// Fast-path admission check ahead of moderation and the transaction.
    pub async fn check(&self, journalist_id: Uuid) -> Result<()> {
        self.check_at(journalist_id, Utc::now()).await
    }

    pub async fn check_at(&self, journalist_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let count = self
            .log
            .count_since(journalist_id, self.window.action, self.window.since(now))
            .await
            .map_err(|e| {
                tracing::error!(%journalist_id, error = %e, "write rate-limit check failed");
                DomainError::RateCheckFailed(e.to_string())
            })?;

        if count >= self.window.max_actions {
            tracing::info!(%journalist_id, count, "post rate limit exceeded");
            return Err(DomainError::PostRateLimitExceeded {
                max_actions: self.window.max_actions,
                window_secs: self.window.window.num_seconds(),
            });
        }
        Ok(())
    }

    /// Reclaims log entries older than `retention`.
    pub async fn purge_expired(&self, retention: Duration) -> Result<u64> {
        let cutoff = Utc::now() - retention;
        let purged = self.log.purge_before(cutoff).await?;
        if purged > 0 {
            tracing::debug!(purged, "purged expired rate-limit events");
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::ports::MockRateLimitRepository;

    #[tokio::test]
    async fn admits_below_ceiling() {
        let mut log = MockRateLimitRepository::new();
        log.expect_count_since().returning(|_, _, _| Ok(0));
        let limiter = WriteLimiter::new(Arc::new(log), 1, Duration::seconds(60));
        assert!(limiter.check(Uuid::new_v4()).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_at_ceiling() {
        let mut log = MockRateLimitRepository::new();
        log.expect_count_since().returning(|_, _, _| Ok(3));
        let limiter = WriteLimiter::new(Arc::new(log), 3, Duration::seconds(60));
        let err = limiter.check(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::PostRateLimitExceeded {
                max_actions: 3,
                window_secs: 60
            }
        ));
    }

    #[tokio::test]
    async fn store_failure_is_not_an_allow() {
        let mut log = MockRateLimitRepository::new();
        log.expect_count_since()
            .returning(|_, _, _| Err(DomainError::Unavailable("db down".into())));
        let limiter = WriteLimiter::new(Arc::new(log), 1, Duration::seconds(60));
        let err = limiter.check(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DomainError::RateCheckFailed(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn counts_only_the_trailing_window() {
        let now = Utc::now();
        let mut log = MockRateLimitRepository::new();
        log.expect_count_since()
            .withf(move |_, action, since| {
                *action == WriteAction::CreateStory && *since == now - Duration::seconds(60)
            })
            .returning(|_, _, _| Ok(0));
        let limiter = WriteLimiter::new(Arc::new(log), 1, Duration::seconds(60));
        limiter.check_at(Uuid::new_v4(), now).await.unwrap();
    }

    #[tokio::test]
    async fn purge_uses_retention_cutoff() {
        let mut log = MockRateLimitRepository::new();
        log.expect_purge_before()
            .withf(|cutoff| *cutoff < Utc::now() - Duration::minutes(59))
            .times(1)
            .returning(|_| Ok(4));
        let limiter = WriteLimiter::new(Arc::new(log), 1, Duration::seconds(60));
        assert_eq!(limiter.purge_expired(Duration::hours(1)).await.unwrap(), 4);
    }
}
