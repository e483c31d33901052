use crate::bot;
use crate::bot::handlers::{get_user_id_safe, Command};
use crate::bot::{views, BotStats, UnauthorizedCache};
use crate::config::{
    get_unauthorized_cache_max_size, get_unauthorized_cache_ttl, get_unauthorized_cooldown,
    Allowlist, BotSettings,
};
use reelfetch_core::extractor::{Dispatcher as MediaDispatcher, YtdlpStrategy};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{error, info};

/// Run the Telegram transport runtime.
pub async fn run_bot(settings: Arc<BotSettings>) {
    let dispatcher = init_media_dispatcher(&settings);
    let bot = Bot::new(settings.telegram.telegram_token.clone());
    let bot_stats = Arc::new(BotStats::new());
    let unauthorized_cache = init_unauthorized_cache();
    let handler = setup_handler();

    match settings.allowlist.as_ref() {
        Allowlist::Open => info!("No allowlist configured, bot is open to everyone"),
        Allowlist::Only(ids) => info!(users = ids.len(), "Allowlist active"),
    }
    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![
            dispatcher,
            settings,
            bot_stats,
            unauthorized_cache
        ])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn init_media_dispatcher(settings: &BotSettings) -> Arc<MediaDispatcher> {
    let fetch = settings.fetch.as_ref();
    let dispatcher =
        MediaDispatcher::new(fetch.strategy_timeout()).with_strategy(YtdlpStrategy::new(fetch));
    info!(
        strategies = ?dispatcher.strategy_names(),
        scratch_dir = %fetch.scratch_dir.display(),
        "Media dispatcher initialized"
    );
    Arc::new(dispatcher)
}

fn init_unauthorized_cache() -> Arc<UnauthorizedCache> {
    let cooldown = get_unauthorized_cooldown();
    let ttl = get_unauthorized_cache_ttl();
    let max_size = get_unauthorized_cache_max_size();

    info!(cooldown, ttl, max_size, "Initializing UnauthorizedCache");

    Arc::new(UnauthorizedCache::new(cooldown, ttl, max_size))
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(
            Update::filter_message().branch(
                dptree::filter(|msg: Message, settings: Arc<BotSettings>| {
                    settings.allowlist.permits(get_user_id_safe(&msg))
                })
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                )
                .branch(
                    dptree::filter(|msg: Message| msg.text().is_some()).endpoint(handle_text),
                ),
            ),
        )
        .branch(
            // Everyone the allowlist rejected
            Update::filter_message()
                .filter(|msg: Message, settings: Arc<BotSettings>| {
                    !settings.allowlist.permits(get_user_id_safe(&msg))
                })
                .endpoint(handle_unauthorized),
        )
}

async fn handle_unauthorized(
    bot: Bot,
    msg: Message,
    cache: Arc<UnauthorizedCache>,
) -> Result<(), teloxide::RequestError> {
    let user_id = get_user_id_safe(&msg);
    let user_name = msg
        .from
        .as_ref()
        .map_or_else(|| "Unknown".to_string(), |u| u.first_name.clone());

    if cache.should_send(user_id, &user_name).await {
        info!(user_id, user_name = %user_name, "Unauthorized access, sending denial");

        if let Err(e) = bot.send_message(msg.chat.id, views::ACCESS_DENIED).await {
            error!(user_id, error = %e, "Failed to send access denied message");
        } else {
            cache.mark_sent(user_id).await;
        }
    }

    respond(())
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    dispatcher: Arc<MediaDispatcher>,
    stats: Arc<BotStats>,
    cache: Arc<UnauthorizedCache>,
    settings: Arc<BotSettings>,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => bot::handlers::start(bot, msg, stats).await,
        Command::Stats => bot::handlers::stats(bot, msg, stats, dispatcher, cache).await,
        Command::Cookies => bot::handlers::cookies(bot, msg, settings).await,
        Command::Healthcheck => bot::handlers::healthcheck(bot, msg).await,
    };
    if let Err(e) = res {
        error!(error = %e, "Command error");
    }
    respond(())
}

async fn handle_text(
    bot: Bot,
    msg: Message,
    dispatcher: Arc<MediaDispatcher>,
    stats: Arc<BotStats>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::handle_text(bot, msg, dispatcher, stats).await {
        error!(error = %e, "Text handler error");
    }
    respond(())
}
