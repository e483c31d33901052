//! Media extraction pipeline
//!
//! URL → [`Dispatcher`] (strategies in registration order, first success
//! wins) → [`DispatchOutcome`] → [`normalize`] → [`MediaEnvelope`].

pub mod cookies;
pub mod dispatcher;
pub mod normalizer;
pub mod stats;
pub mod strategy;
pub mod types;
pub mod ytdlp;

pub use cookies::{parse_cookie_jar, CookieJarReport};
pub use dispatcher::{DispatchError, Dispatcher};
pub use normalizer::normalize;
pub use stats::{StatsSnapshot, StrategyStats};
pub use strategy::{ExtractionStrategy, FailureKind, StrategyError};
pub use types::{DispatchOutcome, EnvelopeMetadata, MediaEnvelope, MediaKind, RawPayload};
pub use ytdlp::YtdlpStrategy;
