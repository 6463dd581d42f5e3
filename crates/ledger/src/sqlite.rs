use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::{Ledger, LedgerError};

/// [`Ledger`] backed by a single-file SQLite database.
///
/// Schema: `videos (url TEXT PRIMARY KEY)`. The migration uses
/// `CREATE TABLE IF NOT EXISTS`, so a database written by an earlier
/// deployment is picked up unchanged.
#[derive(Debug, Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    /// Open (creating if missing) the database at `path` and apply migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        info!(path = %path.display(), "ledger database opened");
        Self::migrate(pool).await
    }

    /// Private in-memory database. Holds a single connection so every query
    /// sees the same data.
    pub async fn in_memory() -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self, LedgerError> {
        sqlx::migrate!().run(&pool).await?;
        debug!("ledger migrations applied");
        Ok(Self { pool })
    }

    /// Close the underlying pool, waiting for checked-out connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait::async_trait]
impl Ledger for SqliteLedger {
    async fn exists(&self, url: &str) -> Result<bool, LedgerError> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS(SELECT 1 FROM videos WHERE url = ?)",
        )
        .bind(url)
        .fetch_one(&self.pool)
        .await?;
        Ok(found != 0)
    }

    async fn all(&self) -> Result<HashSet<String>, LedgerError> {
        let urls = sqlx::query_scalar::<_, String>("SELECT url FROM videos")
            .fetch_all(&self.pool)
            .await?;
        Ok(urls.into_iter().collect())
    }

    async fn add(&self, url: &str) -> Result<(), LedgerError> {
        let result = sqlx::query("INSERT OR IGNORE INTO videos (url) VALUES (?)")
            .bind(url)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            debug!(url, "url already in ledger");
        } else {
            debug!(url, "url recorded in ledger");
        }
        Ok(())
    }

    async fn remove(&self, url: &str) -> Result<u64, LedgerError> {
        let result = sqlx::query("DELETE FROM videos WHERE url = ?")
            .bind(url)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<u64, LedgerError> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM videos")
            .fetch_one(&self.pool)
            .await?;
        Ok(n.max(0) as u64)
    }
}
