//! Durable set of already-published video URLs.
//!
//! The ledger is the deduplication source of truth: the publish pipeline
//! consults it before picking a candidate and records into it only after a
//! video has actually been delivered. Admin commands edit it by hand.

mod error;
mod sqlite;

use std::collections::HashSet;

pub use error::LedgerError;
pub use sqlite::SqliteLedger;

/// Key-set of posted video URLs.
///
/// Every method is a single atomic statement against durable storage.
/// Sequences of calls (check then add) are not transactional.
#[async_trait::async_trait]
pub trait Ledger: Send + Sync {
    /// Whether `url` has been recorded (exact string match).
    async fn exists(&self, url: &str) -> Result<bool, LedgerError>;

    /// Snapshot of every recorded URL.
    async fn all(&self) -> Result<HashSet<String>, LedgerError>;

    /// Record `url`. Recording an existing URL is a no-op.
    async fn add(&self, url: &str) -> Result<(), LedgerError>;

    /// Delete `url`, returning how many records were removed (0 or 1).
    async fn remove(&self, url: &str) -> Result<u64, LedgerError>;

    /// Number of recorded URLs.
    async fn count(&self) -> Result<u64, LedgerError>;
}
