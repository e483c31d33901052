//! Bot-level usage counters.
//!
//! Lives for the process lifetime only; nothing is persisted.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Users served, deliveries and failures since startup
#[derive(Debug, Default)]
pub struct BotStats {
    users: RwLock<HashSet<i64>>,
    downloads: AtomicU64,
    bytes_sent: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time copy of [`BotStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BotStatsSnapshot {
    /// Distinct users seen
    pub users: usize,
    /// Media items delivered
    pub downloads: u64,
    /// Total payload bytes delivered
    pub bytes_sent: u64,
    /// Failed requests
    pub errors: u64,
}

impl BotStats {
    /// Empty counters
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a user; returns `true` on first sight
    pub fn record_user(&self, user_id: i64) -> bool {
        self.users
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(user_id)
    }

    /// Count a delivered media item
    pub fn record_download(&self, bytes: u64) {
        self.downloads.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Count a failed request
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Current values
    #[must_use]
    pub fn snapshot(&self) -> BotStatsSnapshot {
        BotStatsSnapshot {
            users: self
                .users
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .len(),
            downloads: self.downloads.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters() {
        let stats = BotStats::new();
        assert!(stats.record_user(1));
        assert!(!stats.record_user(1));
        assert!(stats.record_user(2));
        stats.record_download(1024);
        stats.record_download(512);
        stats.record_error();

        assert_eq!(
            stats.snapshot(),
            BotStatsSnapshot {
                users: 2,
                downloads: 2,
                bytes_sent: 1536,
                errors: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_concurrent_updates() {
        let stats = Arc::new(BotStats::new());
        let mut handles = Vec::new();
        for user in 0..8 {
            let stats = stats.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    stats.record_user(user);
                    stats.record_download(1);
                }
            }));
        }
        for handle in handles {
            handle.await.expect("task completes");
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.users, 8);
        assert_eq!(snapshot.downloads, 800);
        assert_eq!(snapshot.bytes_sent, 800);
    }
}
