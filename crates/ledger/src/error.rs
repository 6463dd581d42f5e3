use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Ledger database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Ledger migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}
