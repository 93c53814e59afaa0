//! Storage layer for the transit ETA service: a single embedded SQLite
//! file, WAL-mode, with an explicit single-writer discipline layered on
//! top of sqlx's connection pooling.

use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tokio::sync::{Mutex, MutexGuard};

pub mod error;
pub mod idempotency_repository;
pub mod quota_repository;
pub mod rejection_repository;
pub mod ride_audit_repository;
pub mod segment_repository;
pub mod stats_repository;

pub use error::StorageError;
pub use idempotency_repository::IdempotencyRepository;
pub use quota_repository::QuotaRepository;
pub use rejection_repository::RejectionRepository;
pub use ride_audit_repository::RideAuditRepository;
pub use segment_repository::SegmentRepository;
pub use stats_repository::StatsRepository;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Owns the embedded database and enforces the single-writer invariant.
///
/// Readers (ETA queries, discovery) go through `read_pool`, which has many
/// connections against the same WAL-mode file and never blocks behind the
/// writer. Writes go through `begin_write`, which serializes logical
/// transactions with a process-wide `Mutex` bounded by a busy timeout, on
/// top of a pool capped to a single physical connection — the teacher's
/// `max_connections(1)` SQLite test-pool pattern, promoted to a production
/// discipline.
pub struct Store {
    write_pool: SqlitePool,
    read_pool: SqlitePool,
    writer_lock: Mutex<()>,
    busy_timeout: Duration,
}

/// A reserved slot in the single-writer queue plus an open transaction.
/// Dropping it without calling `commit` rolls the transaction back and
/// releases the writer lock.
pub struct WriteTx<'a> {
    _guard: MutexGuard<'a, ()>,
    tx: Transaction<'static, Sqlite>,
}

impl<'a> WriteTx<'a> {
    pub fn as_mut(&mut self) -> &mut Transaction<'static, Sqlite> {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<(), StorageError> {
        self.tx.commit().await.map_err(StorageError::Query)
    }

    pub async fn rollback(self) -> Result<(), StorageError> {
        self.tx.rollback().await.map_err(StorageError::Query)
    }
}

impl Store {
    /// Opens (creating if missing) the embedded database at `database_path`.
    pub async fn open(database_path: &str, busy_timeout: Duration) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(busy_timeout);

        let write_pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await
            .map_err(StorageError::Connection)?;

        let read_pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(StorageError::Connection)?;

        MIGRATOR
            .run(&write_pool)
            .await
            .map_err(StorageError::Migration)?;

        Ok(Self {
            write_pool,
            read_pool,
            writer_lock: Mutex::new(()),
            busy_timeout,
        })
    }

    pub fn read_pool(&self) -> &SqlitePool {
        &self.read_pool
    }

    /// Reserves the single-writer slot and opens a transaction, bounded by
    /// the configured busy timeout. Times out with a retryable
    /// `StorageError::Busy` under persistent contention.
    pub async fn begin_write(&self) -> Result<WriteTx<'_>, StorageError> {
        let guard = tokio::time::timeout(self.busy_timeout, self.writer_lock.lock())
            .await
            .map_err(|_| StorageError::Busy(self.busy_timeout))?;

        let tx = self
            .write_pool
            .begin()
            .await
            .map_err(StorageError::Query)?;

        Ok(WriteTx { _guard: guard, tx })
    }

    /// Check database connectivity for the health endpoint.
    pub async fn check_connection(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1")
            .execute(&self.read_pool)
            .await
            .map_err(StorageError::Query)?;
        Ok(())
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(1);

    pub struct TestStore {
        pub store: Store,
        db_path: std::path::PathBuf,
    }

    impl Drop for TestStore {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.db_path);
            let _ = std::fs::remove_file(format!("{}-wal", self.db_path.display()));
            let _ = std::fs::remove_file(format!("{}-shm", self.db_path.display()));
        }
    }

    pub async fn setup_test_store() -> TestStore {
        let unique = COUNTER.fetch_add(1, Ordering::Relaxed);
        let db_path = std::env::temp_dir().join(format!(
            "transit-eta-test-{}-{}.db",
            std::process::id(),
            unique
        ));
        let _ = std::fs::remove_file(&db_path);

        let store = Store::open(db_path.to_str().unwrap(), Duration::from_secs(5))
            .await
            .expect("open test store");

        TestStore { store, db_path }
    }
}
