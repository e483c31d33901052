use crate::bot::resilient::{
    delete_message_safe, edit_message_safe_resilient, send_message_resilient,
};
use crate::bot::{views, BotStats, UnauthorizedCache};
use crate::config::BotSettings;
use anyhow::Result;
use reelfetch_core::config::{CAPTION_LIMIT, MAX_FILE_SIZE};
use reelfetch_core::extractor::cookies::find_cookie_file;
use reelfetch_core::extractor::{Dispatcher, MediaEnvelope, MediaKind};
use reelfetch_core::utils::{extract_url, is_supported_url, truncate_str};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use teloxide::{
    prelude::*,
    types::{InputFile, ParseMode},
    utils::command::BotCommands,
};
use tracing::{error, info, warn};

fn get_user_name(msg: &Message) -> String {
    if let Some(ref user) = msg.from {
        if let Some(ref username) = user.username {
            return username.clone();
        }
        if !user.first_name.is_empty() {
            return user.first_name.clone();
        }
    }
    "Unknown".to_string()
}

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Supported commands for the bot
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show welcome message
    #[command(description = "Start the bot.")]
    Start,
    /// Show bot and strategy statistics
    #[command(description = "Show bot statistics.")]
    Stats,
    /// Validate the configured cookie file
    #[command(description = "Check the cookie file.")]
    Cookies,
    /// Check bot health
    #[command(description = "Check bot health.")]
    Healthcheck,
}

/// Start handler
///
/// # Errors
///
/// Returns an error if the welcome message cannot be sent.
pub async fn start(bot: Bot, msg: Message, stats: Arc<BotStats>) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    info!(user_id, user_name = %get_user_name(&msg), "User initiated /start command");

    stats.record_user(user_id);
    let first_name = msg
        .from
        .as_ref()
        .map_or_else(|| "there".to_string(), |u| u.first_name.clone());

    bot.send_message(msg.chat.id, views::welcome_text(&first_name, &stats.snapshot()))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Healthcheck handler
///
/// # Errors
///
/// Returns an error if the response cannot be sent.
pub async fn healthcheck(bot: Bot, msg: Message) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    info!(user_id, "Healthcheck command received");
    bot.send_message(msg.chat.id, "OK").await?;
    Ok(())
}

/// Stats handler - bot counters, per-strategy counters and denial throttling
///
/// # Errors
///
/// Returns an error if the stats response cannot be sent.
pub async fn stats(
    bot: Bot,
    msg: Message,
    stats: Arc<BotStats>,
    dispatcher: Arc<Dispatcher>,
    cache: Arc<UnauthorizedCache>,
) -> Result<()> {
    info!(user_id = get_user_id_safe(&msg), "Stats command received");

    let text = views::stats_text(&stats.snapshot(), &dispatcher.stats(), cache.silenced_count());
    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Cookie file health report
///
/// # Errors
///
/// Returns an error if the report cannot be sent.
pub async fn cookies(bot: Bot, msg: Message, settings: Arc<BotSettings>) -> Result<()> {
    info!(user_id = get_user_id_safe(&msg), "Cookies command received");

    let found = find_cookie_file(&settings.fetch.cookie_candidates()).await;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs().cast_signed());
    let text = views::cookies_text(found.as_ref().map(|(p, r)| (p.as_path(), r)), now);

    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Text message handler: download the linked media and relay it back
///
/// # Errors
///
/// Returns an error if the initial status message cannot be sent.
pub async fn handle_text(
    bot: Bot,
    msg: Message,
    dispatcher: Arc<Dispatcher>,
    stats: Arc<BotStats>,
) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let Some(url) = msg
        .text()
        .and_then(extract_url)
        .filter(|url| is_supported_url(url))
    else {
        bot.send_message(msg.chat.id, views::URL_HINT).await?;
        return Ok(());
    };

    stats.record_user(user_id);
    info!(user_id, url, "Download request");

    let status = send_message_resilient(&bot, msg.chat.id, views::PROCESSING).await?;

    let envelope = match dispatcher.extract(url).await {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(user_id, url, error = %e, "Extraction failed");
            stats.record_error();
            edit_message_safe_resilient(&bot, msg.chat.id, status.id, &views::failure_text(&e))
                .await;
            return Ok(());
        }
    };

    let size = envelope.data.len();
    if size > MAX_FILE_SIZE {
        warn!(user_id, size, "Payload exceeds upload ceiling");
        stats.record_error();
        edit_message_safe_resilient(&bot, msg.chat.id, status.id, &views::too_large_text(size))
            .await;
        return Ok(());
    }

    edit_message_safe_resilient(&bot, msg.chat.id, status.id, views::SENDING).await;

    if let Err(e) = send_media(&bot, msg.chat.id, envelope).await {
        error!(user_id, error = %e, "Failed to deliver media");
        stats.record_error();
        let text = views::delivery_failure_text(&e.to_string());
        edit_message_safe_resilient(&bot, msg.chat.id, status.id, &text).await;
        return Ok(());
    }

    stats.record_download(size as u64);
    delete_message_safe(&bot, msg.chat.id, status.id).await;
    send_message_resilient(&bot, msg.chat.id, views::COMPLETE).await?;
    info!(user_id, bytes = size, "Download delivered");
    Ok(())
}

/// File name shown by Telegram clients for the upload
fn upload_file_name(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Photo => "photo.jpg",
        MediaKind::Video => "video.mp4",
    }
}

async fn send_media(bot: &Bot, chat_id: ChatId, envelope: MediaEnvelope) -> Result<()> {
    let caption = truncate_str(&envelope.caption, CAPTION_LIMIT);
    let file = InputFile::memory(envelope.data.to_vec()).file_name(upload_file_name(envelope.kind));

    match envelope.kind {
        MediaKind::Photo => {
            let mut req = bot.send_photo(chat_id, file);
            if !caption.is_empty() {
                req = req.caption(caption);
            }
            req.await?;
        }
        MediaKind::Video => {
            let mut req = bot.send_video(chat_id, file).supports_streaming(true);
            if !caption.is_empty() {
                req = req.caption(caption);
            }
            req.await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parsing() {
        assert!(matches!(
            Command::parse("/cookies", "reelfetch_bot"),
            Ok(Command::Cookies)
        ));
        assert!(matches!(
            Command::parse("/stats", "reelfetch_bot"),
            Ok(Command::Stats)
        ));
        assert!(Command::parse("/unknown", "reelfetch_bot").is_err());
    }

    #[test]
    fn test_upload_file_name() {
        assert_eq!(upload_file_name(MediaKind::Photo), "photo.jpg");
        assert_eq!(upload_file_name(MediaKind::Video), "video.mp4");
    }
}
