//! Telegram Bot API client.
//!
//! Covers the calls the relay needs: `sendMessage` (with an optional reply
//! keyboard), `sendVideo` (multipart upload of a local file) and `getUpdates`
//! (long polling). Rate limit responses surface as
//! [`TelegramError::RateLimited`] so callers can back off.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::traits::{TelegramError, VideoSink};
use crate::types::{ReplyKeyboard, Update};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Extra time allowed on top of the long-poll window before the HTTP
/// request itself is abandoned.
const POLL_SLACK: Duration = Duration::from_secs(10);

/// Content type for an upload, from the file extension yt-dlp chose.
pub fn video_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "m4v" => "video/x-m4v",
        _ => "video/mp4",
    }
}

/// Thin client over the Bot API HTTP endpoints.
#[derive(Clone)]
pub struct TelegramClient {
    bot_token: String,
    api_base: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    /// Creates a client for the public Bot API.
    ///
    /// Returns [`TelegramError::Config`] if the token is empty.
    pub fn new(bot_token: impl Into<String>) -> Result<Self, TelegramError> {
        Self::with_api_base(bot_token, DEFAULT_API_BASE)
    }

    /// Creates a client against a self-hosted Bot API server.
    pub fn with_api_base(
        bot_token: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Result<Self, TelegramError> {
        let bot_token = bot_token.into();
        if bot_token.trim().is_empty() {
            return Err(TelegramError::Config(
                "Telegram bot token must not be empty".to_string(),
            ));
        }
        Ok(Self {
            bot_token,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, TelegramError> {
        let response = request.send().await?;
        let status = response.status();
        let body: Value = response.json().await?;
        let result = interpret_response(status, body)?;
        serde_json::from_value(result).map_err(|e| TelegramError::Api {
            description: format!("unexpected {method} result: {e}"),
        })
    }

    /// Sends a text message, optionally attaching a reply keyboard.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&ReplyKeyboard>,
    ) -> Result<(), TelegramError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = serde_json::to_value(keyboard).map_err(|e| {
                TelegramError::Config(format!("unserializable keyboard: {e}"))
            })?;
        }

        tracing::debug!(chat_id, has_keyboard = keyboard.is_some(), "Sending Telegram message");
        let request = self
            .client
            .post(self.method_url("sendMessage"))
            .timeout(REQUEST_TIMEOUT)
            .json(&body);
        let _: Value = self.execute("sendMessage", request).await?;
        Ok(())
    }

    /// Uploads a local video file to `chat_id`.
    pub async fn send_video(&self, chat_id: i64, path: &Path) -> Result<(), TelegramError> {
        let io_err = |source: std::io::Error| TelegramError::Io {
            path: path.display().to_string(),
            source,
        };
        let file = tokio::fs::File::open(path).await.map_err(io_err)?;
        let size = file.metadata().await.map_err(io_err)?.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());

        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("supports_streaming", "true")
            .part(
                "video",
                Part::stream_with_length(file, size)
                    .file_name(file_name.clone())
                    .mime_str(video_mime(path))?,
            );

        tracing::debug!(chat_id, file = %file_name, size, "Uploading Telegram video");
        let request = self
            .client
            .post(self.method_url("sendVideo"))
            .timeout(UPLOAD_TIMEOUT)
            .multipart(form);
        let _: Value = self.execute("sendVideo", request).await?;
        tracing::info!(chat_id, file = %file_name, "Telegram video sent");
        Ok(())
    }

    /// Long-polls for updates after `offset`, waiting up to `poll_timeout`.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        poll_timeout: Duration,
    ) -> Result<Vec<Update>, TelegramError> {
        let mut body = serde_json::json!({
            "timeout": poll_timeout.as_secs(),
            "allowed_updates": ["message"],
        });
        if let Some(offset) = offset {
            body["offset"] = Value::from(offset);
        }

        let request = self
            .client
            .post(self.method_url("getUpdates"))
            .timeout(poll_timeout + POLL_SLACK)
            .json(&body);
        self.execute("getUpdates", request).await
    }
}

/// Maps a Bot API envelope to its `result` or an error.
///
/// `{"ok": true, "result": ...}` yields the result. HTTP 429 (or
/// `error_code: 429`) becomes [`TelegramError::RateLimited`] using
/// `parameters.retry_after` (default 30s). Anything else is
/// [`TelegramError::Api`] with the API's description.
pub fn interpret_response(status: reqwest::StatusCode, mut body: Value) -> Result<Value, TelegramError> {
    if body.get("ok") == Some(&Value::Bool(true)) {
        return Ok(body.get_mut("result").map(Value::take).unwrap_or(Value::Null));
    }

    let error_code = body.get("error_code").and_then(Value::as_u64);
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || error_code == Some(429) {
        let retry_after = body
            .get("parameters")
            .and_then(|p| p.get("retry_after"))
            .and_then(Value::as_u64)
            .unwrap_or(30);
        return Err(TelegramError::RateLimited {
            retry_after_secs: retry_after,
        });
    }

    let description = body
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("Unknown Telegram API error")
        .to_string();
    Err(TelegramError::Api { description })
}

/// Publishes videos into a fixed channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    client: TelegramClient,
    channel_id: i64,
}

impl ChannelSink {
    pub fn new(client: TelegramClient, channel_id: i64) -> Self {
        Self { client, channel_id }
    }
}

#[async_trait::async_trait]
impl VideoSink for ChannelSink {
    async fn send_video(&self, path: &Path) -> Result<(), TelegramError> {
        self.client.send_video(self.channel_id, path).await
    }

    fn sink_name(&self) -> &str {
        "telegram"
    }
}
