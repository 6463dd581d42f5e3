use serde::{Deserialize, Serialize};

/// Host used when building canonical video URLs.
pub const PLATFORM_HOST: &str = "www.tiktok.com";

/// A trending video reported by the candidate source.
///
/// Lives for a single pipeline cycle; only its canonical URL is ever
/// persisted (as a ledger key).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateVideo {
    /// Author handle, without the leading `@`.
    pub owner: String,
    /// Platform-assigned video id.
    pub id: String,
}

impl CandidateVideo {
    pub fn new(owner: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            id: id.into(),
        }
    }

    /// Canonical URL: `https://www.tiktok.com/@<owner>/video/<id>`.
    pub fn canonical_url(&self) -> String {
        canonical_url(&self.owner, &self.id)
    }
}

impl std::fmt::Display for CandidateVideo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}/{}", self.owner, self.id)
    }
}

/// Build the canonical URL for an owner handle and video id.
///
/// A leading `@` on the handle is tolerated so callers can pass either form.
pub fn canonical_url(owner: &str, id: &str) -> String {
    let owner = owner.strip_prefix('@').unwrap_or(owner);
    format!("https://{PLATFORM_HOST}/@{owner}/video/{id}")
}
