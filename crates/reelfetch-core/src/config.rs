//! Configuration and settings management
//!
//! Loads fetch settings from config files and environment variables and
//! defines pipeline constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default cookie jar locations, checked in order.
pub const DEFAULT_COOKIE_FILES: &str = "instagram_cookies.txt,cookies/instagram_cookies.txt";
/// Default scratch root for staged downloads.
pub const DEFAULT_SCRATCH_DIR: &str = "temp";
/// Default yt-dlp executable.
pub const DEFAULT_YTDLP_BINARY: &str = "yt-dlp";
/// Default timeout for a single yt-dlp run.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 180;
/// Extra time a strategy gets on top of its yt-dlp runs for file handling.
pub const STRATEGY_TIMEOUT_SLACK_SECS: u64 = 10;

/// Telegram caption ceiling applied before delivery (characters).
pub const CAPTION_LIMIT: usize = 200;
/// Largest payload the transport will accept (50MB).
pub const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;
/// Length of the error excerpt shown to users (characters).
pub const ERROR_EXCERPT_LIMIT: usize = 100;
/// Domains the bot treats as downloadable links.
pub const SUPPORTED_DOMAINS: &[&str] = &["instagram.com", "instagr.am"];

/// Transport retry: initial backoff in milliseconds.
pub const TRANSPORT_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Transport retry: maximum backoff in milliseconds.
pub const TRANSPORT_API_MAX_BACKOFF_MS: u64 = 4000;
/// Transport retry: maximum attempts.
pub const TRANSPORT_API_MAX_RETRIES: usize = 3;

/// Extraction settings loaded from configuration sources
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FetchSettings {
    /// Instagram account used when no cookie jar is available
    pub instagram_username: Option<String>,
    /// Password for `instagram_username`
    pub instagram_password: Option<String>,

    /// Comma-separated cookie jar candidates, first existing file wins
    #[serde(default = "default_cookie_files")]
    pub cookie_files: String,

    /// Root directory for per-request scratch subdirectories
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Path or name of the yt-dlp executable
    #[serde(default = "default_ytdlp_binary")]
    pub ytdlp_binary: String,

    /// Upper bound for a single yt-dlp run, in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

fn default_cookie_files() -> String {
    DEFAULT_COOKIE_FILES.to_string()
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SCRATCH_DIR)
}

fn default_ytdlp_binary() -> String {
    DEFAULT_YTDLP_BINARY.to_string()
}

const fn default_download_timeout_secs() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            instagram_username: None,
            instagram_password: None,
            cookie_files: default_cookie_files(),
            scratch_dir: default_scratch_dir(),
            ytdlp_binary: default_ytdlp_binary(),
            download_timeout_secs: default_download_timeout_secs(),
        }
    }
}

/// Build the layered configuration shared by all settings structs.
///
/// Sources, lowest priority first: `config/default`, `config/{RUN_MODE}`,
/// `config/local`, `APP__*` variables, then bare environment variables.
///
/// # Errors
///
/// Returns a `ConfigError` if a present source cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Not checked into git
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Environment::default() maps UPPER_SNAKE_CASE to snake_case keys
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl FetchSettings {
    /// Load settings from config files and the environment.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use reelfetch_core::config::FetchSettings;
    ///
    /// let settings = FetchSettings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }

    /// Cookie jar candidates in lookup order
    #[must_use]
    pub fn cookie_candidates(&self) -> Vec<PathBuf> {
        self.cookie_files
            .split(|c: char| c == ',' || c == ';')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(PathBuf::from)
            .collect()
    }

    /// Username/password pair, only when both are set and non-empty
    #[must_use]
    pub fn login_credentials(&self) -> Option<(&str, &str)> {
        match (
            self.instagram_username.as_deref(),
            self.instagram_password.as_deref(),
        ) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }

    /// Timeout for one yt-dlp run
    #[must_use]
    pub const fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Dispatcher bound for one strategy attempt: the first run, the
    /// degraded-format retry, and slack for scratch handling
    #[must_use]
    pub const fn strategy_timeout(&self) -> Duration {
        Duration::from_secs(
            self.download_timeout_secs
                .saturating_mul(2)
                .saturating_add(STRATEGY_TIMEOUT_SLACK_SECS),
        )
    }
}
