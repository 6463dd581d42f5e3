//! Persisted session snapshot for the candidate source.
//!
//! The on-disk format is the browser "storage state" document:
//!
//! ```json
//! { "cookies": [{ "name": "...", "value": "...", "domain": ".tiktok.com", "path": "/", ... }],
//!   "origins": [] }
//! ```
//!
//! Unknown fields are ignored and `origins` is carried through untouched, so
//! snapshots written by other tooling load without conversion. Only one
//! snapshot is kept: [`SessionState::save`] replaces the file atomically.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::SourceError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub cookies: Vec<Cookie>,
    #[serde(default)]
    pub origins: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    /// Unix seconds; `-1` marks a session cookie.
    #[serde(default = "session_expiry")]
    pub expires: f64,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

fn default_path() -> String {
    "/".to_string()
}

fn session_expiry() -> f64 {
    -1.0
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: default_path(),
            expires: session_expiry(),
            http_only: false,
            secure: false,
            same_site: None,
        }
    }

    /// Whether this cookie should be sent to `host`.
    ///
    /// `.example.com` and `example.com` both match the apex and any subdomain.
    pub fn matches_host(&self, host: &str) -> bool {
        let domain = self.domain.trim_start_matches('.');
        if domain.is_empty() {
            return false;
        }
        host == domain || host.ends_with(&format!(".{domain}"))
    }

    /// Parse a single `Set-Cookie` header value.
    ///
    /// Attributes other than Domain, Path, Secure, HttpOnly and SameSite are
    /// ignored; `Max-Age=0` or a negative max-age yields an already-expired
    /// cookie (`expires == 0`).
    pub fn parse_set_cookie(header: &str, default_domain: &str) -> Option<Self> {
        let mut parts = header.split(';');
        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut cookie = Cookie::new(name, value.trim(), default_domain);
        for attr in parts {
            let (key, val) = match attr.split_once('=') {
                Some((k, v)) => (k.trim(), v.trim()),
                None => (attr.trim(), ""),
            };
            match key.to_ascii_lowercase().as_str() {
                "domain" if !val.is_empty() => cookie.domain = val.to_string(),
                "path" if !val.is_empty() => cookie.path = val.to_string(),
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                "samesite" if !val.is_empty() => cookie.same_site = Some(val.to_string()),
                "max-age" => {
                    if let Ok(secs) = val.parse::<i64>() {
                        cookie.expires = if secs <= 0 { 0.0 } else { now_secs() + secs as f64 };
                    }
                }
                _ => {}
            }
        }
        Some(cookie)
    }

    fn is_expired(&self, now: f64) -> bool {
        self.expires >= 0.0 && self.expires <= now
    }

    fn same_slot(&self, other: &Cookie) -> bool {
        self.name == other.name
            && self.domain.trim_start_matches('.') == other.domain.trim_start_matches('.')
            && self.path == other.path
    }
}

fn now_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

impl SessionState {
    /// Load a snapshot. A missing file is `Ok(None)`.
    pub fn load(path: &Path) -> Result<Option<Self>, SourceError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SourceError::SessionIo {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let state: SessionState =
            serde_json::from_str(&raw).map_err(|source| SourceError::SessionFormat {
                path: path.to_path_buf(),
                source,
            })?;
        info!(path = %path.display(), cookies = state.cookies.len(), "session snapshot loaded");
        Ok(Some(state))
    }

    /// Overwrite the snapshot at `path` (write to a sibling temp file, then rename).
    pub fn save(&self, path: &Path) -> Result<(), SourceError> {
        let io_err = |source| SourceError::SessionIo {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_string_pretty(self).map_err(|source| SourceError::SessionFormat {
            path: path.to_path_buf(),
            source,
        })?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, path).map_err(io_err)?;
        info!(path = %path.display(), cookies = self.cookies.len(), "session snapshot saved");
        Ok(())
    }

    /// Insert or replace a cookie (same name, domain and path).
    /// Expired cookies remove the existing entry instead.
    pub fn upsert(&mut self, cookie: Cookie) {
        self.cookies.retain(|c| !c.same_slot(&cookie));
        if cookie.is_expired(now_secs()) {
            debug!(name = %cookie.name, "dropping expired cookie");
            return;
        }
        self.cookies.push(cookie);
    }

    /// Absorb one `Set-Cookie` header. Returns whether it could be parsed.
    pub fn merge_set_cookie(&mut self, header: &str, default_domain: &str) -> bool {
        match Cookie::parse_set_cookie(header, default_domain) {
            Some(cookie) => {
                self.upsert(cookie);
                true
            }
            None => false,
        }
    }

    /// Value of a cookie by name, regardless of domain.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }

    /// `Cookie` request header for `host`, skipping expired entries.
    /// `None` when nothing applies.
    pub fn cookie_header(&self, host: &str) -> Option<String> {
        let now = now_secs();
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .filter(|c| c.matches_host(host) && !c.is_expired(now))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }
}
