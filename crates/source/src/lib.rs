//! Trending-video discovery.
//!
//! This crate provides:
//! - `TrendingSource` trait consumed by the publish pipeline
//! - `TikTokSource`, a session-backed client for the platform's trending feed
//! - `SessionState`, the persisted cookie snapshot that keeps the session warm
//!   across restarts

pub mod error;
pub mod retry;
pub mod session;
pub mod tiktok;

pub use error::SourceError;
pub use session::{Cookie, SessionState};
pub use tiktok::TikTokSource;

use reelay_core::CandidateVideo;

/// A feed of trending videos.
#[async_trait::async_trait]
pub trait TrendingSource: Send + Sync {
    /// Return up to `count` trending videos.
    ///
    /// Upstream failures (network, expired auth, unreadable payload) are
    /// logged and reported as an empty list: callers treat empty as
    /// "nothing available this cycle".
    async fn fetch_trending(&self, count: usize) -> Vec<CandidateVideo>;

    /// Snapshot of the current authenticated session, if the source has one.
    async fn session_snapshot(&self) -> Option<SessionState>;
}
