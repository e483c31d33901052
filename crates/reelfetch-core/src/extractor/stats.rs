//! Per-strategy success/failure counters owned by a [`Dispatcher`].
//!
//! Counters are diagnostic: increments are relaxed atomics and tolerate
//! interleaving between concurrent requests.
//!
//! [`Dispatcher`]: crate::extractor::Dispatcher

use crate::extractor::strategy::FailureKind;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

#[derive(Debug)]
struct StrategyCounters {
    name: &'static str,
    success: AtomicU64,
    fail: AtomicU64,
    last_failure: RwLock<Option<FailureKind>>,
}

impl StrategyCounters {
    const fn new(name: &'static str) -> Self {
        Self {
            name,
            success: AtomicU64::new(0),
            fail: AtomicU64::new(0),
            last_failure: RwLock::new(None),
        }
    }
}

/// Counters for every registered strategy name
#[derive(Debug, Default)]
pub struct StrategyStats {
    counters: Vec<StrategyCounters>,
}

impl StrategyStats {
    /// Create an empty stats table
    #[must_use]
    pub const fn new() -> Self {
        Self {
            counters: Vec::new(),
        }
    }

    /// Add a zeroed row for `name`; strategies sharing a name share a row
    pub fn register(&mut self, name: &'static str) {
        if self.find(name).is_none() {
            self.counters.push(StrategyCounters::new(name));
        }
    }

    fn find(&self, name: &str) -> Option<&StrategyCounters> {
        self.counters.iter().find(|c| c.name == name)
    }

    /// Count a successful attempt
    pub fn record_success(&self, name: &str) {
        if let Some(counters) = self.find(name) {
            counters.success.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Count a failed attempt and remember its class
    pub fn record_failure(&self, name: &str, kind: FailureKind) {
        if let Some(counters) = self.find(name) {
            counters.fail.fetch_add(1, Ordering::Relaxed);
            *counters
                .last_failure
                .write()
                .unwrap_or_else(PoisonError::into_inner) = Some(kind);
        }
    }

    /// Point-in-time copy of all counters, in registration order
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            strategies: self
                .counters
                .iter()
                .map(|c| StrategySnapshot {
                    name: c.name.to_string(),
                    success: c.success.load(Ordering::Relaxed),
                    fail: c.fail.load(Ordering::Relaxed),
                    last_failure: *c
                        .last_failure
                        .read()
                        .unwrap_or_else(PoisonError::into_inner),
                })
                .collect(),
        }
    }
}

/// Counters of one strategy at snapshot time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategySnapshot {
    /// Strategy name
    pub name: String,
    /// Successful attempts
    pub success: u64,
    /// Failed attempts
    pub fail: u64,
    /// Class of the most recent failure
    pub last_failure: Option<FailureKind>,
}

/// Counters of all strategies at snapshot time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// One entry per registered strategy name, in registration order
    pub strategies: Vec<StrategySnapshot>,
}

impl StatsSnapshot {
    /// Counters for `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StrategySnapshot> {
        self.strategies.iter().find(|s| s.name == name)
    }

    /// Successful attempts across all strategies
    #[must_use]
    pub fn total_success(&self) -> u64 {
        self.strategies.iter().map(|s| s.success).sum()
    }

    /// Failed attempts across all strategies
    #[must_use]
    pub fn total_fail(&self) -> u64 {
        self.strategies.iter().map(|s| s.fail).sum()
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.strategies.is_empty() {
            return f.write_str("no strategies registered");
        }
        for (i, s) in self.strategies.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}: {} ok / {} failed", s.name, s.success, s.fail)?;
            if let Some(kind) = s.last_failure {
                write!(f, " (last: {kind})")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero_and_increment() {
        let mut stats = StrategyStats::new();
        stats.register("ytdlp");

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.get("ytdlp").map(|s| (s.success, s.fail)), Some((0, 0)));

        stats.record_success("ytdlp");
        stats.record_failure("ytdlp", FailureKind::LoginRequired);
        stats.record_failure("ytdlp", FailureKind::Timeout);

        let snapshot = stats.snapshot();
        let ytdlp = snapshot.get("ytdlp").expect("registered");
        assert_eq!(ytdlp.success, 1);
        assert_eq!(ytdlp.fail, 2);
        assert_eq!(ytdlp.last_failure, Some(FailureKind::Timeout));
    }

    #[test]
    fn test_unknown_names_are_ignored() {
        let mut stats = StrategyStats::new();
        stats.register("ytdlp");
        stats.record_success("other");

        assert_eq!(stats.snapshot().total_success(), 0);
        assert!(stats.snapshot().get("other").is_none());
    }

    #[test]
    fn test_duplicate_registration_shares_row() {
        let mut stats = StrategyStats::new();
        stats.register("ytdlp");
        stats.register("ytdlp");
        assert_eq!(stats.snapshot().strategies.len(), 1);
    }

    #[test]
    fn test_display_lists_strategies() {
        let mut stats = StrategyStats::new();
        stats.register("ytdlp");
        stats.record_failure("ytdlp", FailureKind::DownloadFailed);

        assert_eq!(
            stats.snapshot().to_string(),
            "ytdlp: 0 ok / 1 failed (last: download_failed)"
        );
        assert_eq!(StatsSnapshot::default().to_string(), "no strategies registered");
    }
}
