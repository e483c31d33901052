//! Status-message helpers that retry transient Telegram API failures.
//!
//! Media uploads are not routed through here: a retried upload can deliver
//! the file twice.

use anyhow::{anyhow, Result};
use reelfetch_core::utils::{retry_transport_operation, truncate_str};
use teloxide::prelude::*;
use teloxide::types::{ChatId, Message, MessageId, ParseMode};
use tracing::{debug, warn};

/// Telegram rejects text longer than 4096 characters
const STATUS_TEXT_LIMIT: usize = 4000;

fn fit_status_text(text: &str) -> String {
    if text.chars().count() > STATUS_TEXT_LIMIT {
        format!("{}...", truncate_str(text, STATUS_TEXT_LIMIT))
    } else {
        text.to_string()
    }
}

/// Send an HTML message, retrying with backoff.
///
/// # Errors
///
/// Returns the last error once all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
) -> Result<Message> {
    let text = fit_status_text(&text.into());
    retry_transport_operation(|| async {
        bot.send_message(chat_id, text.clone())
            .parse_mode(ParseMode::Html)
            .await
            .map_err(|e| anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Edit an HTML message, retrying with backoff.
///
/// `Ok(None)` means Telegram reported the text as unchanged.
///
/// # Errors
///
/// Returns the last error once all retries are exhausted.
pub async fn edit_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: impl Into<String>,
) -> Result<Option<Message>> {
    let text = fit_status_text(&text.into());
    retry_transport_operation(|| async {
        match bot
            .edit_message_text(chat_id, msg_id, text.clone())
            .parse_mode(ParseMode::Html)
            .await
        {
            Ok(msg) => Ok(Some(msg)),
            Err(e) if e.to_string().contains("message is not modified") => Ok(None),
            Err(e) => Err(anyhow!("Telegram edit error: {e}")),
        }
    })
    .await
}

/// Edit a status message, logging instead of failing.
///
/// Returns `false` if the edit could not be applied.
pub async fn edit_message_safe_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: &str,
) -> bool {
    match edit_message_resilient(bot, chat_id, msg_id, text).await {
        Ok(Some(_)) => true,
        Ok(None) => {
            debug!("Status update skipped: message is not modified");
            true
        }
        Err(e) if e.to_string().contains("message to edit not found") => {
            debug!(error = %e, "Status update skipped");
            false
        }
        Err(e) => {
            warn!(error = %e, "Failed to edit status message after retries");
            false
        }
    }
}

/// Delete a status message, logging instead of failing.
pub async fn delete_message_safe(bot: &Bot, chat_id: ChatId, msg_id: MessageId) {
    let result = retry_transport_operation(|| async {
        bot.delete_message(chat_id, msg_id)
            .await
            .map_err(|e| anyhow!("Telegram delete error: {e}"))
    })
    .await;

    if let Err(e) = result {
        warn!(error = %e, "Failed to delete status message");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_status_text() {
        assert_eq!(fit_status_text("short"), "short");

        let long = "я".repeat(STATUS_TEXT_LIMIT + 10);
        let fitted = fit_status_text(&long);
        assert_eq!(fitted.chars().count(), STATUS_TEXT_LIMIT + 3);
        assert!(fitted.ends_with("..."));
    }
}
