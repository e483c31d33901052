//! Texts shown to users. All dynamic content is HTML-escaped.

use crate::bot::stats::BotStatsSnapshot;
use html_escape::encode_text;
use reelfetch_core::config::{ERROR_EXCERPT_LIMIT, MAX_FILE_SIZE};
use reelfetch_core::extractor::cookies::CookieJarReport;
use reelfetch_core::extractor::{DispatchError, FailureKind, StatsSnapshot};
use reelfetch_core::utils::{format_bytes, truncate_str};
use std::fmt::Write;
use std::path::Path;

/// First status message of a download
pub const PROCESSING: &str = "⏳ Processing your request...";
/// Status while the media is uploaded
pub const SENDING: &str = "📤 Sending to Telegram...";
/// Final reply after a delivery
pub const COMPLETE: &str = "✅ Download complete!";
/// Reply to text without a supported link
pub const URL_HINT: &str = "🔗 Send me a link to an Instagram post, reel or story.";
/// Reply to users outside the allowlist
pub const ACCESS_DENIED: &str = "⛔️ Access denied";

const TWO_FACTOR_TEXT: &str = "❌ Instagram requires two-factor authentication.\n\
    Please disable 2FA temporarily or use a cookies file from a logged-in browser.";

/// Greeting for `/start`
#[must_use]
pub fn welcome_text(first_name: &str, stats: &BotStatsSnapshot) -> String {
    format!(
        "<b>Welcome to Reelfetch!</b>\n\n\
        Hello {}! I download Instagram content.\n\n\
        <b>Features:</b>\n\
        • Posts, reels and stories\n\
        • Photos and videos up to {}\n\n\
        <b>Stats:</b>\n\
        • Users served: {}\n\
        • Total downloads: {}\n\n\
        Just send me any Instagram URL to start!",
        encode_text(first_name),
        format_bytes(MAX_FILE_SIZE as u64),
        stats.users,
        stats.downloads
    )
}

/// Report for `/stats`
#[must_use]
pub fn stats_text(bot: &BotStatsSnapshot, strategies: &StatsSnapshot, silenced: u64) -> String {
    format!(
        "<b>📊 Bot Statistics</b>\n\n\
        • Users served: {}\n\
        • Downloads: {}\n\
        • Data sent: {}\n\
        • Errors: {}\n\
        • Silenced access denials: {}\n\n\
        <b>Strategies:</b>\n<code>{}</code>",
        bot.users,
        bot.downloads,
        format_bytes(bot.bytes_sent),
        bot.errors,
        silenced,
        encode_text(&strategies.to_string())
    )
}

/// Report for `/cookies`; lists cookie names only, never values
#[must_use]
pub fn cookies_text(found: Option<(&Path, &CookieJarReport)>, now: i64) -> String {
    let Some((path, report)) = found else {
        return "🍪 No cookie file found. Downloads run with username/password or anonymously."
            .to_string();
    };

    let status = if report.is_usable() {
        "✅ usable"
    } else {
        "❌ not usable"
    };
    let mut text = format!(
        "<b>🍪 Cookie file</b> <code>{}</code>: {status}\n\n",
        encode_text(&path.display().to_string())
    );

    if report.cookies.is_empty() {
        text.push_str("No valid cookie lines.\n");
    } else {
        let names: Vec<&str> = report.cookies.iter().map(|c| c.name.as_str()).collect();
        let _ = writeln!(
            text,
            "Cookies ({}): {}",
            names.len(),
            encode_text(&names.join(", "))
        );
        if report.cookie("sessionid").is_none() {
            text.push_str("⚠️ No sessionid cookie, Instagram will treat you as logged out.\n");
        }
        let expired = report.expired_count(now);
        if expired > 0 {
            let _ = writeln!(text, "⚠️ Expired cookies: {expired}");
        }
    }

    for issue in &report.issues {
        let _ = writeln!(text, "❌ Line {}: {}", issue.line, issue.kind);
    }

    text
}

/// Status text for a failed dispatch
#[must_use]
pub fn failure_text(err: &DispatchError) -> String {
    if err.last_kind() == Some(FailureKind::TwoFactorRequired) {
        return TWO_FACTOR_TEXT.to_string();
    }
    format!(
        "❌ Failed: {}",
        encode_text(&truncate_str(err.last_reason(), ERROR_EXCERPT_LIMIT))
    )
}

/// Status text for a failed upload
#[must_use]
pub fn delivery_failure_text(err: &str) -> String {
    format!(
        "❌ Failed to send: {}",
        encode_text(&truncate_str(err, ERROR_EXCERPT_LIMIT))
    )
}

/// Status text for a payload over the upload ceiling
#[must_use]
pub fn too_large_text(size: usize) -> String {
    format!(
        "❌ File is too large for Telegram: {} (limit {})",
        format_bytes(size as u64),
        format_bytes(MAX_FILE_SIZE as u64)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelfetch_core::extractor::parse_cookie_jar;

    fn dispatch_error(reason: &str, kind: FailureKind) -> DispatchError {
        DispatchError::AllStrategiesFailed {
            last_reason: reason.to_string(),
            last_kind: Some(kind),
            stats: StatsSnapshot::default(),
        }
    }

    #[test]
    fn test_failure_text_two_factor() {
        let err = dispatch_error("2FA required", FailureKind::TwoFactorRequired);
        assert!(failure_text(&err).contains("two-factor authentication"));
    }

    #[test]
    fn test_failure_text_truncates_and_escapes() {
        let reason = format!("<b>{}", "x".repeat(200));
        let text = failure_text(&dispatch_error(&reason, FailureKind::DownloadFailed));
        assert!(text.starts_with("❌ Failed: &lt;b&gt;"));
        assert!(!text.contains("<b>"));
        assert_eq!(text.matches('x').count(), ERROR_EXCERPT_LIMIT - 3);
    }

    #[test]
    fn test_cookies_text_hides_values() {
        let report = parse_cookie_jar(
            ".instagram.com\tTRUE\t/\tTRUE\t100\tsessionid\tsupersecret\n\
             .instagram.com TRUE / TRUE 0 csrftoken abc\n",
        );
        let text = cookies_text(Some((Path::new("cookies.txt"), &report)), 200);

        assert!(text.contains("sessionid"));
        assert!(!text.contains("supersecret"));
        assert!(text.contains("not usable"));
        assert!(text.contains("Line 2: no tabs found"));
        assert!(text.contains("Expired cookies: 1"));
    }

    #[test]
    fn test_cookies_text_missing_file() {
        assert!(cookies_text(None, 0).contains("No cookie file found"));
    }

    #[test]
    fn test_welcome_and_stats_text() {
        let bot = BotStatsSnapshot {
            users: 3,
            downloads: 7,
            bytes_sent: 2048,
            errors: 1,
        };
        let welcome = welcome_text("<Ann>", &bot);
        assert!(welcome.contains("&lt;Ann&gt;"));
        assert!(welcome.contains("Users served: 3"));
        assert!(welcome.contains("Total downloads: 7"));

        let stats = stats_text(&bot, &StatsSnapshot::default(), 4);
        assert!(stats.contains("Data sent: 2.0 KB"));
        assert!(stats.contains("no strategies registered"));
    }

    #[test]
    fn test_too_large_text() {
        assert!(too_large_text(MAX_FILE_SIZE + 1).contains("limit 50.0 MB"));
    }
}
