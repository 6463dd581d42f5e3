//! Delivery trait and shared error types.

use std::path::Path;

/// Errors that can occur while talking to the Bot API.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Could not read upload {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Telegram API error: {description}")]
    Api { description: String },

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}

/// Destination that accepts a finished video file.
///
/// The publish pipeline only records a video as posted after `send_video`
/// returns `Ok`.
#[async_trait::async_trait]
pub trait VideoSink: Send + Sync {
    async fn send_video(&self, path: &Path) -> Result<(), TelegramError>;

    /// Human-readable name for this destination (e.g., "telegram").
    fn sink_name(&self) -> &str;
}
