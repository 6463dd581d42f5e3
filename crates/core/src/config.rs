use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Source of raw configuration values. `from_env` reads the process
/// environment; tests pass a map.
type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn env_opt(lookup: Lookup<'_>, key: &str) -> Option<String> {
    lookup(key).map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn env_or(lookup: Lookup<'_>, key: &str, default: &str) -> String {
    env_opt(lookup, key).unwrap_or_else(|| default.to_string())
}

fn env_required(lookup: Lookup<'_>, key: &'static str) -> Result<String, ConfigError> {
    env_opt(lookup, key).ok_or(ConfigError::Missing(key))
}

fn parse_value<T>(key: &'static str, raw: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value: raw,
    })
}

fn env_parse_or<T>(lookup: Lookup<'_>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(lookup, key) {
        Some(raw) => parse_value(key, raw),
        None => Ok(default),
    }
}

/// `"true"` (any case) is true; anything else, including unset, is false.
fn env_flag(lookup: Lookup<'_>, key: &str) -> bool {
    env_opt(lookup, key)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub schedule: ScheduleConfig,
    pub source: SourceConfig,
    pub fetch: FetchConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            telegram: TelegramConfig::from_lookup(lookup)?,
            schedule: ScheduleConfig::from_lookup(lookup)?,
            source: SourceConfig::from_lookup(lookup)?,
            fetch: FetchConfig::from_lookup(lookup)?,
            storage: StorageConfig::from_lookup(lookup),
        })
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!(
            "  telegram:  channel_id={}, admin_id={}",
            self.telegram.channel_id,
            self.telegram.admin_id
        );
        tracing::info!(
            "  schedule:  interval={}m, misfire_grace={}s",
            self.schedule.interval_minutes,
            self.schedule.misfire_grace_seconds
        );
        tracing::info!(
            "  source:    mode={}, trending_count={}, session_file={}, ms_token={}",
            self.source.browser_mode,
            self.source.trending_count,
            self.source.session_file.display(),
            if self.source.ms_token.is_some() { "set" } else { "(none)" }
        );
        tracing::info!(
            "  fetch:     ytdlp={}, download_dir={}",
            self.fetch.ytdlp_path,
            self.fetch.download_dir.display()
        );
        tracing::info!("  storage:   database={}", self.storage.database_path.display());
    }
}

// ── Telegram ──────────────────────────────────────────────────

#[derive(Clone, Serialize)]
pub struct TelegramConfig {
    #[serde(skip_serializing)]
    pub bot_token: String,
    /// Destination channel for published videos.
    pub channel_id: i64,
    /// The only user allowed to drive the admin commands.
    pub admin_id: i64,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("channel_id", &self.channel_id)
            .field("admin_id", &self.admin_id)
            .finish()
    }
}

impl TelegramConfig {
    fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            bot_token: env_required(lookup, "BOT_TOKEN")?,
            channel_id: parse_value("CHANNEL_ID", env_required(lookup, "CHANNEL_ID")?)?,
            admin_id: parse_value("ADMIN_ID", env_required(lookup, "ADMIN_ID")?)?,
        })
    }
}

// ── Schedule ──────────────────────────────────────────────────

/// One year. Longer intervals overflow timer arithmetic.
const MAX_INTERVAL_MINUTES: u64 = 60 * 24 * 365;

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleConfig {
    pub interval_minutes: u64,
    /// How late a tick may fire and still count as on schedule.
    pub misfire_grace_seconds: u64,
}

impl ScheduleConfig {
    fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let interval_minutes = env_parse_or(lookup, "POSTING_INTERVAL_MINUTES", 60u64)?;
        if interval_minutes == 0 {
            return Err(ConfigError::Invalid {
                key: "POSTING_INTERVAL_MINUTES",
                value: "0".to_string(),
                reason: "interval must be at least one minute".to_string(),
            });
        }
        if interval_minutes > MAX_INTERVAL_MINUTES {
            return Err(ConfigError::Invalid {
                key: "POSTING_INTERVAL_MINUTES",
                value: interval_minutes.to_string(),
                reason: format!("interval must not exceed {MAX_INTERVAL_MINUTES} minutes"),
            });
        }
        Ok(Self {
            interval_minutes,
            misfire_grace_seconds: env_parse_or(lookup, "MISFIRE_GRACE_SECONDS", 30u64)?,
        })
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }

    pub fn misfire_grace(&self) -> Duration {
        Duration::from_secs(self.misfire_grace_seconds)
    }
}

// ── Candidate source ──────────────────────────────────────────

/// How the candidate source presents itself upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserMode {
    Headless,
    Headed,
}

impl BrowserMode {
    /// Headed only when explicitly forced and not on managed hosting.
    pub fn resolve(force_headed: bool, managed_hosting: bool) -> Self {
        if force_headed && !managed_hosting {
            BrowserMode::Headed
        } else {
            BrowserMode::Headless
        }
    }
}

impl std::fmt::Display for BrowserMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrowserMode::Headless => write!(f, "headless"),
            BrowserMode::Headed => write!(f, "headed"),
        }
    }
}

#[derive(Clone, Serialize)]
pub struct SourceConfig {
    pub browser_mode: BrowserMode,
    /// Optional `msToken` cookie seeded into new sessions.
    #[serde(skip_serializing)]
    pub ms_token: Option<String>,
    /// Upper bound on candidates requested per cycle.
    pub trending_count: usize,
    pub session_file: PathBuf,
    pub session_attempts: u32,
    pub session_retry_delay_seconds: u64,
    pub request_timeout_seconds: u64,
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("browser_mode", &self.browser_mode)
            .field("ms_token", &self.ms_token.as_ref().map(|_| "<redacted>"))
            .field("trending_count", &self.trending_count)
            .field("session_file", &self.session_file)
            .field("session_attempts", &self.session_attempts)
            .field("session_retry_delay_seconds", &self.session_retry_delay_seconds)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

impl SourceConfig {
    fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let managed_hosting = env_flag(lookup, "RENDER") || env_flag(lookup, "PRODUCTION");
        Ok(Self {
            browser_mode: BrowserMode::resolve(env_flag(lookup, "FORCE_HEADED"), managed_hosting),
            ms_token: env_opt(lookup, "ms_token").or_else(|| env_opt(lookup, "MS_TOKEN")),
            trending_count: env_parse_or(lookup, "TRENDING_COUNT", 20usize)?,
            session_file: PathBuf::from(env_or(lookup, "SESSION_FILE", "tiktok_session.json")),
            session_attempts: env_parse_or(lookup, "SESSION_ATTEMPTS", 3u32)?.max(1),
            session_retry_delay_seconds: env_parse_or(lookup, "SESSION_RETRY_DELAY_SECONDS", 5u64)?,
            request_timeout_seconds: env_parse_or(lookup, "SOURCE_TIMEOUT_SECONDS", 60u64)?,
        })
    }

    pub fn session_retry_delay(&self) -> Duration {
        Duration::from_secs(self.session_retry_delay_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

// ── Media fetch ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct FetchConfig {
    pub ytdlp_path: String,
    pub download_dir: PathBuf,
    pub timeout_seconds: u64,
}

impl FetchConfig {
    fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            ytdlp_path: env_or(lookup, "YTDLP_PATH", "yt-dlp"),
            download_dir: PathBuf::from(env_or(lookup, "DOWNLOAD_DIR", "downloads")),
            timeout_seconds: env_parse_or(lookup, "DOWNLOAD_TIMEOUT_SECONDS", 300u64)?,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    /// Substring a manually added URL must contain.
    pub platform_domain: String,
}

impl StorageConfig {
    fn from_lookup(lookup: Lookup<'_>) -> Self {
        Self {
            database_path: PathBuf::from(env_or(lookup, "DATABASE_PATH", "posted_videos.db")),
            platform_domain: env_or(lookup, "PLATFORM_DOMAIN", "tiktok.com").to_lowercase(),
        }
    }
}
