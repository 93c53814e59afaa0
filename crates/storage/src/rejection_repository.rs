//! Append-only log of rejected segment observations, retention-bound.

use chrono::{DateTime, Duration, Utc};
use sqlx::{Sqlite, Transaction};
use transit_eta_domain::ingest::{RejectReason, RejectionEntry};

use crate::StorageError;

fn reason_code(reason: RejectReason) -> &'static str {
    match reason {
        RejectReason::Outlier => "outlier",
        RejectReason::LowConfidence => "low_confidence",
        RejectReason::InvalidSegment => "invalid_segment",
        RejectReason::StaleTimestamp => "stale_timestamp",
        RejectReason::TooManySegments => "too_many_segments",
    }
}

pub struct RejectionRepository;

impl RejectionRepository {
    pub async fn insert(
        tx: &mut Transaction<'static, Sqlite>,
        entry: &RejectionEntry,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO rejection_log (segment_id, bin_id, reason, observed_value, bucket_id, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(entry.segment_id)
        .bind(entry.bin_id.map(|b| b as i64))
        .bind(reason_code(entry.reason))
        .bind(entry.observed_value)
        .bind(&entry.bucket_id)
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
        let result = sqlx::query("DELETE FROM rejection_log WHERE created_at < ?1")
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
    use crate::test_support::setup_test_store;
    use transit_eta_domain::ingest::RejectReason;

    fn sample_entry(reason: RejectReason) -> RejectionEntry {
        RejectionEntry {
            segment_id: Some(1),
            bin_id: Some(58),
            reason,
            observed_value: Some(9001.0),
            bucket_id: "dev1".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_then_sweep_removes_only_stale_rows() {
        let db = setup_test_store().await;
        let now = Utc::now();

        let mut wtx = db.store.begin_write().await.unwrap();
        RejectionRepository::insert(wtx.as_mut(), &sample_entry(RejectReason::Outlier), now - Duration::days(40))
            .await
            .unwrap();
        RejectionRepository::insert(wtx.as_mut(), &sample_entry(RejectReason::LowConfidence), now)
            .await
            .unwrap();
        wtx.commit().await.unwrap();

        let mut wtx2 = db.store.begin_write().await.unwrap();
        let removed = RejectionRepository::sweep(wtx2.as_mut(), now, 30).await.unwrap();
        wtx2.commit().await.unwrap();

        assert_eq!(removed, 1);
    }
}
