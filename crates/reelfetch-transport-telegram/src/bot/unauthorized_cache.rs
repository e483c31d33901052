//! Unauthorized access flood protection
//!
//! Users outside the allowlist get the "Access Denied" reply at most once per
//! cooldown period; further attempts are dropped silently.

use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Tracks when a denial was last sent to each user
#[derive(Clone)]
pub struct UnauthorizedCache {
    /// user_id -> (), evicted after the cooldown
    cache: Cache<i64, ()>,
    cooldown: Duration,
    silenced_count: Arc<AtomicU64>,
}

impl UnauthorizedCache {
    /// Create a cache.
    ///
    /// Entries expire after the shorter of `cooldown_secs` and `ttl_secs`,
    /// after which the user receives the denial again.
    ///
    /// # Examples
    ///
    /// ```
    /// use reelfetch_transport_telegram::bot::UnauthorizedCache;
    ///
    /// let cache = UnauthorizedCache::new(1200, 7200, 10_000);
    /// assert_eq!(cache.cooldown().as_secs(), 1200);
    /// ```
    #[must_use]
    pub fn new(cooldown_secs: u64, ttl_secs: u64, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(cooldown_secs.min(ttl_secs)))
            .build();

        Self {
            cache,
            cooldown: Duration::from_secs(cooldown_secs),
            silenced_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Whether a denial should be sent to `user_id` now
    pub async fn should_send(&self, user_id: i64, user_name: &str) -> bool {
        if self.cache.get(&user_id).await.is_none() {
            return true;
        }

        let count = self.silenced_count.fetch_add(1, Ordering::Relaxed) + 1;

        // Log only every 100th silenced attempt
        if count.is_multiple_of(100) {
            debug!(
                count,
                user_id, user_name, "Silenced unauthorized attempts"
            );
        }

        false
    }

    /// Start the cooldown for `user_id`
    pub async fn mark_sent(&self, user_id: i64) {
        self.cache.insert(user_id, ()).await;
    }

    /// Users currently in cooldown
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Denials suppressed since startup
    #[must_use]
    pub fn silenced_count(&self) -> u64 {
        self.silenced_count.load(Ordering::Relaxed)
    }

    /// Configured cooldown
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cooldown_blocks_repeat_denials() {
        let cache = UnauthorizedCache::new(60, 120, 100);

        assert!(cache.should_send(12345, "TestUser").await);
        cache.mark_sent(12345).await;
        assert!(!cache.should_send(12345, "TestUser").await);

        // Other users are independent
        assert!(cache.should_send(222, "Other").await);
    }

    #[tokio::test]
    async fn test_silenced_and_entry_counts() {
        let cache = UnauthorizedCache::new(60, 120, 100);
        cache.mark_sent(111).await;
        cache.mark_sent(222).await;

        for _ in 0..5 {
            cache.should_send(111, "TestUser").await;
        }
        assert_eq!(cache.silenced_count(), 5);

        cache.cache.run_pending_tasks().await;
        assert_eq!(cache.entry_count(), 2);
    }
}
