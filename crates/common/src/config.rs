use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Telegram bot token
    pub telegram_bot_token: String,

    /// Numeric id of the chat or channel the bot announces to. Message ids
    /// are only unique within a chat, so update filtering needs the number.
    pub telegram_chat_id: i64,

    /// SQLite connection string (default: sqlite:marquee.db)
    pub database_url: String,

    /// Base URL of the content source
    pub source_base_url: String,

    /// Listing filter expression passed to the content source (default: new-releases)
    pub source_filter: String,

    /// Number of listing pages to fetch per cycle (default: 1)
    pub source_pages: u32,

    /// Base URL of the Overseerr-compatible request service
    pub overseerr_url: String,

    /// API key for the request service
    pub overseerr_api_key: String,

    /// Hours between announce cycles (default: 6)
    pub fetch_interval_hours: u64,

    /// Delay between consecutive announcements in milliseconds (default: 1500)
    pub send_delay_ms: u64,

    /// Reaction emoji that triggers a request (default: the red heart)
    pub request_emoji: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            telegram_bot_token: std::env::var("TELEGRAM_BOT_TOKEN")
                .map_err(|_| anyhow::anyhow!("TELEGRAM_BOT_TOKEN environment variable is required"))?,
            telegram_chat_id: std::env::var("TELEGRAM_CHAT_ID")
                .map_err(|_| anyhow::anyhow!("TELEGRAM_CHAT_ID environment variable is required"))?
                .parse()
                .map_err(|_| anyhow::anyhow!("TELEGRAM_CHAT_ID must be a numeric chat id"))?,
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:marquee.db".to_string()),
            source_base_url: std::env::var("SOURCE_BASE_URL")
                .map_err(|_| anyhow::anyhow!("SOURCE_BASE_URL environment variable is required"))?,
            source_filter: std::env::var("SOURCE_FILTER")
                .unwrap_or_else(|_| "new-releases".to_string()),
            source_pages: std::env::var("SOURCE_PAGES")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SOURCE_PAGES must be a valid u32"))?,
            overseerr_url: std::env::var("OVERSEERR_URL")
                .map_err(|_| anyhow::anyhow!("OVERSEERR_URL environment variable is required"))?,
            overseerr_api_key: std::env::var("OVERSEERR_API_KEY")
                .map_err(|_| anyhow::anyhow!("OVERSEERR_API_KEY environment variable is required"))?,
            fetch_interval_hours: std::env::var("FETCH_INTERVAL_HOURS")
                .unwrap_or_else(|_| "6".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("FETCH_INTERVAL_HOURS must be a valid u64"))?,
            send_delay_ms: std::env::var("SEND_DELAY_MS")
                .unwrap_or_else(|_| "1500".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SEND_DELAY_MS must be a valid u64"))?,
            request_emoji: std::env::var("REQUEST_EMOJI").unwrap_or_else(|_| "\u{2764}".to_string()),
        })
    }
}
