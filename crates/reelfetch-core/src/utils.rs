//! Utility functions for text handling, link detection and retries.
//!
//! Regex patterns are compile-time validated through the `lazy-regex` crate.

// lazy_regex! uses once_cell internally
#![allow(clippy::non_std_lazy_statics)]

use crate::config::SUPPORTED_DOMAINS;
use anyhow::Result;
use lazy_regex::lazy_regex;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;

/// Match the first http(s) link in free text
static RE_URL: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r#"https?://[^\s<>"']+"#);

/// Safely truncates a string to a maximum character length (not bytes).
///
/// This is UTF-8 safe and will not panic on multi-byte characters.
///
/// # Examples
///
/// ```
/// use reelfetch_core::utils::truncate_str;
/// let s = "Привет, мир!";
/// assert_eq!(truncate_str(s, 6), "Привет");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Returns the first link found in `text`, if any.
///
/// # Examples
///
/// ```
/// use reelfetch_core::utils::extract_url;
/// let text = "look https://www.instagram.com/p/abc/ nice";
/// assert_eq!(extract_url(text), Some("https://www.instagram.com/p/abc/"));
/// ```
#[must_use]
pub fn extract_url(text: &str) -> Option<&str> {
    RE_URL.find(text).map(|m| m.as_str())
}

/// Checks whether the link points at one of the supported domains.
#[must_use]
pub fn is_supported_url(url: &str) -> bool {
    let lowered = url.to_lowercase();
    SUPPORTED_DOMAINS
        .iter()
        .any(|domain| lowered.contains(domain))
}

/// Formats a byte count as a human readable size.
///
/// # Examples
///
/// ```
/// use reelfetch_core::utils::format_bytes;
/// assert_eq!(format_bytes(512), "512.0 B");
/// assert_eq!(format_bytes(1536), "1.5 KB");
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{value:.1} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.1} TB")
}

/// Retry a transport API operation with exponential backoff.
///
/// Intended for Telegram calls (status messages, edits) that may fail on
/// transient network errors:
/// - Initial delay: 500ms
/// - Max delay: 4s
/// - Max attempts: 3
///
/// # Errors
///
/// Returns the last error if all attempts fail.
///
/// # Examples
///
/// ```no_run
/// use reelfetch_core::utils::retry_transport_operation;
/// use anyhow::Result;
///
/// async fn send_status() -> Result<()> {
///     Ok(())
/// }
///
/// # async fn example() -> Result<()> {
/// retry_transport_operation(|| async { send_status().await }).await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_transport_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    use crate::config::{
        TRANSPORT_API_INITIAL_BACKOFF_MS, TRANSPORT_API_MAX_BACKOFF_MS, TRANSPORT_API_MAX_RETRIES,
    };

    let retry_strategy = ExponentialBackoff::from_millis(TRANSPORT_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TRANSPORT_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TRANSPORT_API_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            "Transport API operation failed after {} attempts: {}",
            TRANSPORT_API_MAX_RETRIES, e
        );
        e
    })
}
