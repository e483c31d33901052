/// Command and message handlers
pub mod handlers;
/// Resilient messaging with automatic retry for Telegram API operations
pub mod resilient;
/// Bot-level usage counters
pub mod stats;
/// Unauthorized access flood protection
pub mod unauthorized_cache;
/// User-facing message texts
pub mod views;

pub use stats::BotStats;
pub use unauthorized_cache::UnauthorizedCache;
