//! Strategy Dispatcher - tries extraction strategies in order
//!
//! Holds an ordered list of [`ExtractionStrategy`] implementations and the
//! [`StrategyStats`] they feed. Each dispatch evaluates strategies in
//! registration order and stops at the first success.

use crate::extractor::normalizer::normalize;
use crate::extractor::stats::{StatsSnapshot, StrategyStats};
use crate::extractor::strategy::{ExtractionStrategy, FailureKind, StrategyError};
use crate::extractor::types::{DispatchOutcome, MediaEnvelope};
use chrono::Utc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Reason reported when no strategy is registered
const NO_STRATEGIES_REASON: &str = "no extraction strategies registered";

/// Errors surfaced to callers of [`Dispatcher::dispatch`]
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Every registered strategy failed for this URL
    #[error("All strategies failed: {last_reason}")]
    AllStrategiesFailed {
        /// Message of the last failure encountered
        last_reason: String,
        /// Class of the last failure, `None` when nothing was attempted
        last_kind: Option<FailureKind>,
        /// Counters after this dispatch
        stats: StatsSnapshot,
    },
}

impl DispatchError {
    /// Message of the last underlying failure
    #[must_use]
    pub fn last_reason(&self) -> &str {
        match self {
            Self::AllStrategiesFailed { last_reason, .. } => last_reason,
        }
    }

    /// Class of the last underlying failure
    #[must_use]
    pub const fn last_kind(&self) -> Option<FailureKind> {
        match self {
            Self::AllStrategiesFailed { last_kind, .. } => *last_kind,
        }
    }
}

/// Ordered strategy registry with owned per-strategy counters
pub struct Dispatcher {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    stats: StrategyStats,
    attempt_timeout: Duration,
}

impl Dispatcher {
    /// Create an empty dispatcher; every attempt is bounded by `attempt_timeout`
    #[must_use]
    pub const fn new(attempt_timeout: Duration) -> Self {
        Self {
            strategies: Vec::new(),
            stats: StrategyStats::new(),
            attempt_timeout,
        }
    }

    /// Register a strategy after all previously registered ones
    pub fn register(&mut self, strategy: Box<dyn ExtractionStrategy>) {
        info!(strategy = strategy.name(), "Registered extraction strategy");
        self.stats.register(strategy.name());
        self.strategies.push(strategy);
    }

    /// Builder-style [`Self::register`]
    #[must_use]
    pub fn with_strategy(mut self, strategy: impl ExtractionStrategy + 'static) -> Self {
        self.register(Box::new(strategy));
        self
    }

    /// Names of registered strategies in evaluation order
    #[must_use]
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Number of registered strategies
    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Check if any strategies are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Current counters
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Try strategies in order until one returns a payload.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::AllStrategiesFailed`] carrying the last
    /// failure reason when no strategy succeeds.
    #[instrument(skip(self))]
    pub async fn dispatch(&self, url: &str) -> Result<DispatchOutcome, DispatchError> {
        let mut last_reason = NO_STRATEGIES_REASON.to_string();
        let mut last_kind = None;

        for strategy in &self.strategies {
            let name = strategy.name();
            debug!(strategy = name, "Trying strategy");

            let result = match tokio::time::timeout(self.attempt_timeout, strategy.download(url))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(StrategyError::Timeout(self.attempt_timeout)),
            };

            match result {
                Ok(payload) => {
                    self.stats.record_success(name);
                    info!(
                        strategy = name,
                        bytes = payload.content.len(),
                        "Strategy succeeded"
                    );
                    return Ok(DispatchOutcome {
                        strategy: name.to_string(),
                        payload,
                        timestamp: Utc::now(),
                    });
                }
                Err(e) => {
                    let kind = e.kind();
                    self.stats.record_failure(name, kind);
                    warn!(strategy = name, kind = %kind, error = %e, "Strategy failed");
                    last_reason = e.to_string();
                    last_kind = Some(kind);
                }
            }
        }

        Err(DispatchError::AllStrategiesFailed {
            last_reason,
            last_kind,
            stats: self.stats.snapshot(),
        })
    }

    /// Dispatch and normalize into a transport-ready envelope.
    ///
    /// # Errors
    ///
    /// Same as [`Self::dispatch`].
    pub async fn extract(&self, url: &str) -> Result<MediaEnvelope, DispatchError> {
        self.dispatch(url).await.map(normalize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::strategy::MockExtractionStrategy;
    use crate::extractor::types::{MediaKind, RawPayload};

    fn failing(name: &'static str, message: &'static str) -> MockExtractionStrategy {
        let mut mock = MockExtractionStrategy::new();
        mock.expect_name().return_const(name);
        mock.expect_download().times(1).returning(move |_| {
            Err(StrategyError::DownloadFailed {
                message: message.to_string(),
            })
        });
        mock
    }

    fn succeeding(name: &'static str, content: &'static [u8]) -> MockExtractionStrategy {
        let mut mock = MockExtractionStrategy::new();
        mock.expect_name().return_const(name);
        mock.expect_download()
            .times(1)
            .returning(move |url| Ok(RawPayload::new(content, url)));
        mock
    }

    fn never_called(name: &'static str) -> MockExtractionStrategy {
        let mut mock = MockExtractionStrategy::new();
        mock.expect_name().return_const(name);
        mock.expect_download().times(0);
        mock
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let dispatcher = Dispatcher::new(Duration::from_secs(5))
            .with_strategy(failing("first", "boom"))
            .with_strategy(succeeding("second", b"\xff\xd8data"))
            .with_strategy(never_called("third"));

        let outcome = dispatcher
            .dispatch("https://instagram.com/p/abc/")
            .await
            .expect("second strategy succeeds");

        assert_eq!(outcome.strategy, "second");
        assert_eq!(outcome.payload.url, "https://instagram.com/p/abc/");

        let stats = dispatcher.stats();
        assert_eq!(stats.get("first").map(|s| s.fail), Some(1));
        assert_eq!(stats.get("second").map(|s| s.success), Some(1));
        assert_eq!(stats.get("third").map(|s| (s.success, s.fail)), Some((0, 0)));
    }

    #[tokio::test]
    async fn test_all_failed_carries_last_reason() {
        let dispatcher = Dispatcher::new(Duration::from_secs(5))
            .with_strategy(failing("first", "first reason"))
            .with_strategy(failing("second", "second reason"));

        let err = dispatcher
            .dispatch("https://instagram.com/p/abc/")
            .await
            .expect_err("all strategies fail");

        assert_eq!(err.last_reason(), "Download failed: second reason");
        assert_eq!(err.last_kind(), Some(FailureKind::DownloadFailed));
        let DispatchError::AllStrategiesFailed { stats, .. } = err;
        assert_eq!(stats.total_fail(), 2);
        assert_eq!(stats.total_success(), 0);
    }

    #[tokio::test]
    async fn test_empty_registry_fails() {
        let dispatcher = Dispatcher::new(Duration::from_secs(5));
        assert!(dispatcher.is_empty());

        let err = dispatcher
            .dispatch("https://instagram.com/p/abc/")
            .await
            .expect_err("nothing to try");
        assert_eq!(err.last_reason(), NO_STRATEGIES_REASON);
        assert_eq!(err.last_kind(), None);
    }

    struct SlowStrategy;

    #[async_trait::async_trait]
    impl ExtractionStrategy for SlowStrategy {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn download(&self, url: &str) -> Result<RawPayload, StrategyError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(RawPayload::new(Vec::<u8>::new(), url))
        }
    }

    #[tokio::test]
    async fn test_attempt_timeout_counts_as_failure() {
        let dispatcher = Dispatcher::new(Duration::from_millis(50)).with_strategy(SlowStrategy);

        let err = dispatcher
            .dispatch("https://instagram.com/reel/x/")
            .await
            .expect_err("attempt times out");

        assert_eq!(err.last_kind(), Some(FailureKind::Timeout));
        assert!(err.last_reason().ends_with("after 50ms"));
        assert_eq!(dispatcher.stats().get("slow").map(|s| s.fail), Some(1));
    }

    #[tokio::test]
    async fn test_extract_normalizes_outcome() {
        let dispatcher = Dispatcher::new(Duration::from_secs(5))
            .with_strategy(succeeding("only", b"\x89PNG\r\n"));

        let envelope = dispatcher
            .extract("https://instagram.com/p/abc/")
            .await
            .expect("succeeds");

        assert_eq!(envelope.kind, MediaKind::Photo);
        assert_eq!(envelope.metadata.strategy, "only");
    }
}
