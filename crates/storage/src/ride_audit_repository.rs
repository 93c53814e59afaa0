//! Append-only accepted-segment audit trail, retention-bound.

use chrono::{DateTime, Duration, Utc};
use sqlx::{Sqlite, Transaction};

use crate::StorageError;

pub struct RideAuditRepository;

impl RideAuditRepository {
    pub async fn insert(
        tx: &mut Transaction<'static, Sqlite>,
        segment_id: i64,
        bin_id: u16,
        duration_sec: f64,
        bucket_id: &str,
        observed_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO ride_audit (segment_id, bin_id, duration_sec, bucket_id, observed_at, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(segment_id)
        .bind(bin_id as i64)
        .bind(duration_sec)
        .bind(bucket_id)
        .bind(observed_at.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&mut **tx)
        .await
        .map_err(StorageError::Query)?;

        Ok(())
    }

    pub async fn sweep(
        tx: &mut Transaction<'static, Sqlite>,
        now: DateTime<Utc>,
        retention_days: u32,
    ) -> Result<u64, StorageError> {
        let cutoff = now - Duration::days(retention_days as i64);
        let result = sqlx::query("DELETE FROM ride_audit WHERE created_at < ?1")
            .bind(cutoff.to_rfc3339())
            .execute(&mut **tx)
            .await
            .map_err(StorageError::Query)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment_repository::SegmentRepository;
    use crate::test_support::setup_test_store;

    #[tokio::test]
    async fn insert_then_sweep_removes_only_stale_rows() {
        let db = setup_test_store().await;
        let now = Utc::now();

        let mut wtx = db.store.begin_write().await.unwrap();
        let segment_id = SegmentRepository::import_segment(wtx.as_mut(), "R1", 0, "S1", "S2")
            .await
            .unwrap();
        RideAuditRepository::insert(wtx.as_mut(), segment_id, 58, 280.0, "dev1", now, now - Duration::days(400))
            .await
            .unwrap();
        RideAuditRepository::insert(wtx.as_mut(), segment_id, 58, 290.0, "dev1", now, now)
            .await
            .unwrap();
        wtx.commit().await.unwrap();

        let mut wtx2 = db.store.begin_write().await.unwrap();
        let removed = RideAuditRepository::sweep(wtx2.as_mut(), now, 365).await.unwrap();
        wtx2.commit().await.unwrap();

        assert_eq!(removed, 1);
    }
}
