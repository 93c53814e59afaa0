//! Storage errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection error: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),

    #[error("Query error: {0}")]
    Query(#[source] sqlx::Error),

    /// The single-writer lock was not acquired within the configured busy
    /// timeout. Retryable.
    #[error("writer busy: lock not acquired within {0:?}")]
    Busy(std::time::Duration),
}

impl From<StorageError> for transit_eta_domain::DomainError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Busy(_) => transit_eta_domain::DomainError::StorageBusy,
            other => transit_eta_domain::DomainError::ServerError(anyhow::anyhow!(other)),
        }
    }
}
