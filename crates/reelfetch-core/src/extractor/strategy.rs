//! Extraction strategy trait and its error taxonomy

use crate::extractor::types::RawPayload;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// One concrete method of fetching media behind a URL
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// Strategy name used for stats and logging
    fn name(&self) -> &'static str;

    /// Fetch the media behind `url`
    ///
    /// # Errors
    ///
    /// Returns a [`StrategyError`] describing why the media could not be fetched.
    async fn download(&self, url: &str) -> Result<RawPayload, StrategyError>;
}

/// Errors a strategy can report to the dispatcher
#[derive(Error, Debug)]
pub enum StrategyError {
    /// Account behind the credentials has two-factor authentication enabled
    #[error("2FA required - please use cookies file instead ({0})")]
    TwoFactorRequired(String),
    /// The content needs an authenticated session
    #[error("{hint} ({detail})", hint = login_hint(.story))]
    LoginRequired {
        /// URL pointed at a story
        story: bool,
        /// Underlying tool message
        detail: String,
    },
    /// Requested format is not available
    #[error("Requested format is not available: {0}")]
    FormatUnsupported(String),
    /// Any other download failure
    #[error("Download failed: {message}")]
    DownloadFailed {
        /// Underlying tool message
        message: String,
    },
    /// Attempt exceeded its time budget
    #[error("Download timed out after {0:?}")]
    Timeout(Duration),
    /// Local file handling failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn login_hint(story: &bool) -> &'static str {
    if *story {
        "This story requires login. Make sure you follow this account and the story is still active."
    } else {
        "Login required - cookies may be expired. Please refresh your cookies."
    }
}

impl StrategyError {
    /// Failure class used for stats and user-facing messages
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::TwoFactorRequired(_) => FailureKind::TwoFactorRequired,
            Self::LoginRequired { .. } => FailureKind::LoginRequired,
            Self::FormatUnsupported(_) => FailureKind::FormatUnsupported,
            Self::DownloadFailed { .. } => FailureKind::DownloadFailed,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Io(_) => FailureKind::Io,
        }
    }
}

/// Class of a strategy failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// See [`StrategyError::TwoFactorRequired`]
    TwoFactorRequired,
    /// See [`StrategyError::LoginRequired`]
    LoginRequired,
    /// See [`StrategyError::FormatUnsupported`]
    FormatUnsupported,
    /// See [`StrategyError::DownloadFailed`]
    DownloadFailed,
    /// See [`StrategyError::Timeout`]
    Timeout,
    /// See [`StrategyError::Io`]
    Io,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TwoFactorRequired => "two_factor_required",
            Self::LoginRequired => "login_required",
            Self::FormatUnsupported => "format_unsupported",
            Self::DownloadFailed => "download_failed",
            Self::Timeout => "timeout",
            Self::Io => "io",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_message_depends_on_story() {
        let story = StrategyError::LoginRequired {
            story: true,
            detail: "login required".to_string(),
        };
        let post = StrategyError::LoginRequired {
            story: false,
            detail: "login required".to_string(),
        };

        assert!(story.to_string().starts_with("This story requires login"));
        assert!(post.to_string().starts_with("Login required - cookies may be expired"));
        assert!(post.to_string().contains("login required"));
        assert_eq!(post.kind(), FailureKind::LoginRequired);
    }

    #[test]
    fn test_timeout_message_keeps_subsecond_precision() {
        let err = StrategyError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "Download timed out after 250ms");
    }

    #[test]
    fn test_kind_display_is_snake_case() {
        assert_eq!(FailureKind::TwoFactorRequired.to_string(), "two_factor_required");
        assert_eq!(
            StrategyError::Timeout(Duration::from_secs(5)).kind().to_string(),
            "timeout"
        );
    }
}
