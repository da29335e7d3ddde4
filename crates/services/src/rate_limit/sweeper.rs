//! Periodic cleanup of limiter state, decoupled from request handling.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::{ReadLimiter, WriteLimiter};

/// Spawns the sweep loop. The first sweep runs one `interval` after start.
pub fn spawn_sweeper(
    read: Arc<ReadLimiter>,
    write: Arc<WriteLimiter>,
    interval: Duration,
    retention: chrono::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep_once(&read, &write, retention).await;
        }
    })
}

pub async fn sweep_once(read: &ReadLimiter, write: &WriteLimiter, retention: chrono::Duration) {
    read.evict_if_oversized();
    if let Err(e) = write.purge_expired(retention).await {
        tracing::warn!(error = %e, "rate-limit history sweep failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::ReadLimitConfig;
    use domains::error::DomainError;
    use domains::ports::MockRateLimitRepository;

    #[tokio::test]
    async fn sweep_survives_store_errors() {
        let mut log = MockRateLimitRepository::new();
        log.expect_purge_before()
            .times(1)
            .returning(|_| Err(DomainError::Unavailable("db".into())));
        let write = WriteLimiter::new(Arc::new(log), 1, chrono::Duration::seconds(60));
        let read = ReadLimiter::new(ReadLimitConfig::from_rpm(10, 0));
        read.check("a");

        sweep_once(&read, &write, chrono::Duration::hours(1)).await;
        assert_eq!(read.tracked_addresses(), 0);
    }
}
