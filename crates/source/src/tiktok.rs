//! TikTok trending feed over the public web endpoints.
//!
//! A session is a cookie jar ([`SessionState`]) warmed up by visiting the
//! home page; the recommend-feed endpoint is then queried with those cookies.
//! Cookie shape and endpoint quirks stay inside this module so the rest of
//! the system only sees [`TrendingSource`].

use std::sync::Mutex;

use reqwest::header::{HeaderMap, ACCEPT, COOKIE, SET_COOKIE, USER_AGENT};
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info, warn};

use reelay_core::config::{BrowserMode, SourceConfig};
use reelay_core::CandidateVideo;

use crate::error::SourceError;
use crate::retry::retry_fixed;
use crate::session::{Cookie, SessionState};
use crate::TrendingSource;

pub const DEFAULT_BASE_URL: &str = "https://www.tiktok.com";

const HEADLESS_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) HeadlessChrome/124.0.0.0 Safari/537.36";
const DESKTOP_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Session-backed client for the trending feed.
#[derive(Debug)]
pub struct TikTokSource {
    client: reqwest::Client,
    base_url: Url,
    host: String,
    user_agent: &'static str,
    session: Mutex<SessionState>,
}

impl TikTokSource {
    /// Establish a session against the production endpoints.
    pub async fn connect(
        config: &SourceConfig,
        snapshot: Option<SessionState>,
    ) -> Result<Self, SourceError> {
        Self::connect_to(DEFAULT_BASE_URL, config, snapshot).await
    }

    /// Establish a session against `base_url`.
    ///
    /// Cookies from `snapshot` and the configured `msToken` seed the jar, then
    /// the home page is fetched to refresh them. The warm-up is retried
    /// `session_attempts` times with a fixed delay; exhausting the attempts is
    /// [`SourceError::SessionUnavailable`].
    pub async fn connect_to(
        base_url: &str,
        config: &SourceConfig,
        snapshot: Option<SessionState>,
    ) -> Result<Self, SourceError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SourceError::Payload(format!("invalid base url '{base_url}': {e}")))?;
        let host = base_url.host_str().unwrap_or_default().to_string();

        let mut session = snapshot.unwrap_or_default();
        if let Some(token) = &config.ms_token {
            session.upsert(Cookie::new("msToken", token.clone(), ".tiktok.com"));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        let source = Self {
            client,
            base_url,
            host,
            user_agent: match config.browser_mode {
                BrowserMode::Headless => HEADLESS_UA,
                BrowserMode::Headed => DESKTOP_UA,
            },
            session: Mutex::new(session),
        };

        info!(
            mode = %config.browser_mode,
            attempts = config.session_attempts,
            "establishing source session"
        );
        retry_fixed(
            "source session",
            config.session_attempts,
            config.session_retry_delay(),
            |_| source.warm_up(),
        )
        .await
        .map_err(|e| SourceError::SessionUnavailable {
            attempts: config.session_attempts.max(1),
            last_error: e.to_string(),
        })?;
        info!(cookies = source.snapshot().cookies.len(), "source session established");

        Ok(source)
    }

    /// Current cookie jar.
    pub fn snapshot(&self) -> SessionState {
        self.session
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    async fn warm_up(&self) -> Result<(), SourceError> {
        let response = self
            .client
            .get(self.base_url.clone())
            .headers(self.request_headers())
            .send()
            .await?;
        self.absorb_cookies(response.headers());

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status,
                context: "session warm-up".to_string(),
            });
        }
        Ok(())
    }

    async fn try_fetch(&self, count: usize) -> Result<Vec<CandidateVideo>, SourceError> {
        let url = self
            .base_url
            .join("/api/recommend/item_list/")
            .map_err(|e| SourceError::Payload(e.to_string()))?;

        let count_param = count.to_string();
        let mut query: Vec<(&str, String)> = vec![
            ("aid", "1988".to_string()),
            ("app_language", "en".to_string()),
            ("browser_language", "en-US".to_string()),
            ("device_platform", "web_pc".to_string()),
            ("count", count_param),
        ];
        let token = self.snapshot().get("msToken").map(str::to_string);
        if let Some(token) = token {
            query.push(("msToken", token));
        }

        let response = self
            .client
            .get(url)
            .query(&query)
            .headers(self.request_headers())
            .send()
            .await?;
        self.absorb_cookies(response.headers());

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status,
                context: "trending feed".to_string(),
            });
        }

        let body = response.text().await?;
        parse_item_list(&body, count)
    }

    fn request_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(v) = self.user_agent.parse() {
            headers.insert(USER_AGENT, v);
        }
        if let Ok(v) = "application/json, text/plain, */*".parse() {
            headers.insert(ACCEPT, v);
        }
        let cookie_header = self.snapshot().cookie_header(&self.host);
        if let Some(v) = cookie_header.and_then(|c| c.parse().ok()) {
            headers.insert(COOKIE, v);
        }
        headers
    }

    fn absorb_cookies(&self, headers: &HeaderMap) {
        let mut session = match self.session.lock() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        };
        for value in headers.get_all(SET_COOKIE) {
            if let Ok(raw) = value.to_str() {
                if !session.merge_set_cookie(raw, &self.host) {
                    debug!(header = raw, "ignoring unparseable Set-Cookie");
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl TrendingSource for TikTokSource {
    async fn fetch_trending(&self, count: usize) -> Vec<CandidateVideo> {
        info!(count, "fetching trending videos");
        match self.try_fetch(count).await {
            Ok(videos) if videos.is_empty() => {
                warn!("trending feed returned no videos");
                videos
            }
            Ok(videos) => {
                debug!(received = videos.len(), "trending feed fetched");
                videos
            }
            Err(e) => {
                warn!(error = %e, "trending feed unavailable");
                Vec::new()
            }
        }
    }

    async fn session_snapshot(&self) -> Option<SessionState> {
        Some(self.snapshot())
    }
}

// ── Feed payload ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemListResponse {
    #[serde(default)]
    status_code: i64,
    #[serde(default)]
    status_msg: Option<String>,
    #[serde(default)]
    item_list: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    id: String,
    author: FeedAuthor,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedAuthor {
    unique_id: String,
}

/// Decode a recommend-feed payload into at most `count` candidates.
///
/// Items that do not decode, or carry an empty id or author handle, are
/// skipped without failing the batch.
pub fn parse_item_list(body: &str, count: usize) -> Result<Vec<CandidateVideo>, SourceError> {
    if body.trim().is_empty() {
        return Err(SourceError::Payload("empty response body".to_string()));
    }
    let parsed: ItemListResponse =
        serde_json::from_str(body).map_err(|e| SourceError::Payload(e.to_string()))?;

    if parsed.status_code != 0 {
        return Err(SourceError::Payload(format!(
            "feed status {}: {}",
            parsed.status_code,
            parsed.status_msg.unwrap_or_default()
        )));
    }

    Ok(parsed
        .item_list
        .into_iter()
        .filter_map(|raw| match serde_json::from_value::<FeedItem>(raw) {
            Ok(item) if !item.id.is_empty() && !item.author.unique_id.is_empty() => {
                Some(CandidateVideo::new(item.author.unique_id, item.id))
            }
            Ok(item) => {
                debug!(id = %item.id, "skipping feed item without id or author handle");
                None
            }
            Err(e) => {
                debug!(error = %e, "skipping malformed feed item");
                None
            }
        })
        .take(count)
        .collect())
}
