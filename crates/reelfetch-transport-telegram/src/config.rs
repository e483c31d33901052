//! Telegram transport settings.

use config::ConfigError;
use reelfetch_core::config::FetchSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Telegram transport settings loaded from environment variables.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TelegramSettings {
    /// Telegram Bot API token, also read from `TELEGRAM_BOT_TOKEN`.
    #[serde(alias = "telegram_bot_token")]
    pub telegram_token: String,
    /// Comma-separated list of allowed user IDs. Unset or blank means everyone may use the bot.
    #[serde(rename = "allowed_users")]
    pub allowed_users_str: Option<String>,
}

/// Who may use the bot, parsed once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Allowlist {
    /// No allowlist configured
    Open,
    /// Only these user IDs
    Only(HashSet<i64>),
}

impl Allowlist {
    /// Whether `user_id` may use the bot
    #[must_use]
    pub fn permits(&self, user_id: i64) -> bool {
        match self {
            Self::Open => true,
            Self::Only(ids) => ids.contains(&user_id),
        }
    }
}

/// Combined settings used by the Telegram transport layer.
#[derive(Clone)]
pub struct BotSettings {
    /// Extraction settings shared across transport handlers.
    pub fetch: Arc<FetchSettings>,
    /// Telegram-specific settings.
    pub telegram: Arc<TelegramSettings>,
    /// Parsed allowlist.
    pub allowlist: Arc<Allowlist>,
}

impl BotSettings {
    /// Create a new combined settings bundle.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the allowlist contains an invalid user ID.
    pub fn new(fetch: FetchSettings, telegram: TelegramSettings) -> Result<Self, ConfigError> {
        let allowlist = telegram.allowlist()?;
        Ok(Self {
            fetch: Arc::new(fetch),
            telegram: Arc::new(telegram),
            allowlist: Arc::new(allowlist),
        })
    }
}

impl TelegramSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        reelfetch_core::config::build_config()?.try_deserialize()
    }

    /// Parse the allowlist.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the first token that is not a user ID,
    /// so a mistyped list never leaves the bot open.
    pub fn allowlist(&self) -> Result<Allowlist, ConfigError> {
        let tokens: Vec<&str> = self
            .allowed_users_str
            .as_deref()
            .unwrap_or_default()
            .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .collect();

        if tokens.is_empty() {
            return Ok(Allowlist::Open);
        }

        tokens
            .into_iter()
            .map(|token| {
                token.parse::<i64>().map_err(|_| {
                    ConfigError::Message(format!("ALLOWED_USERS: invalid user ID {token:?}"))
                })
            })
            .collect::<Result<HashSet<_>, _>>()
            .map(Allowlist::Only)
    }
}

/// Cooldown period (seconds) between "Access Denied" messages for same user.
/// Default: 20 minutes.
pub const UNAUTHORIZED_COOLDOWN_SECS: u64 = 1200;
/// Time-to-live (seconds) for cache entries.
/// Default: 2 hours.
pub const UNAUTHORIZED_CACHE_TTL_SECS: u64 = 7200;
/// Maximum cache capacity (number of entries).
pub const UNAUTHORIZED_CACHE_MAX_SIZE: u64 = 10_000;

fn env_or(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Get unauthorized cooldown from env or default.
///
/// Environment variable: `UNAUTHORIZED_COOLDOWN_SECS`.
#[must_use]
pub fn get_unauthorized_cooldown() -> u64 {
    env_or("UNAUTHORIZED_COOLDOWN_SECS", UNAUTHORIZED_COOLDOWN_SECS)
}

/// Get unauthorized cache TTL from env or default.
///
/// Environment variable: `UNAUTHORIZED_CACHE_TTL_SECS`.
#[must_use]
pub fn get_unauthorized_cache_ttl() -> u64 {
    env_or("UNAUTHORIZED_CACHE_TTL_SECS", UNAUTHORIZED_CACHE_TTL_SECS)
}

/// Get unauthorized cache max size from env or default.
///
/// Environment variable: `UNAUTHORIZED_CACHE_MAX_SIZE`.
#[must_use]
pub fn get_unauthorized_cache_max_size() -> u64 {
    env_or("UNAUTHORIZED_CACHE_MAX_SIZE", UNAUTHORIZED_CACHE_MAX_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_users(list: Option<&str>) -> TelegramSettings {
        TelegramSettings {
            telegram_token: "dummy".to_string(),
            allowed_users_str: list.map(str::to_string),
        }
    }

    #[test]
    fn test_list_parsing() -> Result<(), ConfigError> {
        let Allowlist::Only(ids) = with_users(Some("123,456")).allowlist()? else {
            panic!("expected a restricted allowlist");
        };
        assert_eq!(ids, HashSet::from([123, 456]));

        let Allowlist::Only(ids) = with_users(Some("333; 444 555")).allowlist()? else {
            panic!("expected a restricted allowlist");
        };
        assert_eq!(ids.len(), 3);
        Ok(())
    }

    #[test]
    fn test_empty_allowlist_is_open() -> Result<(), ConfigError> {
        assert_eq!(with_users(None).allowlist()?, Allowlist::Open);
        assert_eq!(with_users(Some(" , ")).allowlist()?, Allowlist::Open);
        assert!(Allowlist::Open.permits(42));

        let list = with_users(Some("1,2")).allowlist()?;
        assert!(list.permits(2));
        assert!(!list.permits(42));
        Ok(())
    }

    #[test]
    fn test_invalid_allowlist_is_rejected() {
        for raw in ["12345x", "abc, 777", "1;2;three"] {
            let err = with_users(Some(raw))
                .allowlist()
                .expect_err("invalid token rejected");
            assert!(err.to_string().contains("invalid user ID"), "{raw}: {err}");
        }

        let err = BotSettings::new(FetchSettings::default(), with_users(Some("12345x")))
            .err()
            .expect("settings rejected");
        assert!(err.to_string().contains("12345x"));
    }

    #[test]
    fn test_token_accepts_bot_token_name() -> Result<(), ConfigError> {
        let settings: TelegramSettings = config::Config::builder()
            .set_override("telegram_bot_token", "123:abc")?
            .build()?
            .try_deserialize()?;
        assert_eq!(settings.telegram_token, "123:abc");
        Ok(())
    }
}
