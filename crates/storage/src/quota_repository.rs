//! Quota Gate: a persistent, per-bucket token bucket with a hard hourly
//! cap. The check-and-spend is a single read-modify-write inside the
//! caller's write transaction; linearizability per `bucket_id` falls out
//! of the single-writer discipline in [`crate::Store`] rather than a
//! lower-level compare-and-swap, since every admitted request already
//! holds the exclusive writer lock for the whole transaction.

use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite, Transaction};
use transit_eta_domain::quota::{apply_refill_and_debit, QuotaConfig, QuotaDecision};

use crate::StorageError;

pub struct QuotaRepository;

impl QuotaRepository {
    pub async fn check_and_spend(
        tx: &mut Transaction<'static, Sqlite>,
        bucket_id: &str,
        now: DateTime<Utc>,
        cfg: &QuotaConfig,
    ) -> Result<QuotaDecision, StorageError> {
        let existing = sqlx::query("SELECT tokens, last_refill FROM rate_limit_buckets WHERE bucket_id = ?1")
            .bind(bucket_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(StorageError::Query)?;

        let (tokens, last_refill) = match existing {
            Some(row) => {
                let tokens: i64 = row.get("tokens");
                let last_refill: String = row.get("last_refill");
                let last_refill = DateTime::parse_from_rfc3339(&last_refill)
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or(now);
                (tokens as u32, last_refill)
            }
            None => (cfg.capacity, now),
        };

        let (admitted, new_tokens, new_refill) = apply_refill_and_debit(tokens, last_refill, now, cfg);

        sqlx::query(
            "INSERT INTO rate_limit_buckets (bucket_id, tokens, last_refill) VALUES (?1, ?2, ?3) \
             ON CONFLICT (bucket_id) DO UPDATE SET tokens = ?2, last_refill = ?3",
        )
        .bind(bucket_id)
        .bind(new_tokens)
        .bind(new_refill.to_rfc3339())
        .execute(&mut **tx)
        .await
        .map_err(StorageError::Query)?;

        let reset_unix = (new_refill + chrono::Duration::seconds(cfg.window_secs)).timestamp();

        Ok(QuotaDecision {
            admitted,
            limit: cfg.capacity,
            remaining: new_tokens,
            reset_unix,
        })
    }

    /// Sweeps buckets that have been idle (no refill) beyond the given age.
    pub async fn sweep(
        tx: &mut Transaction<'static, Sqlite>,
        now: DateTime<Utc>,
        idle_hours: u32,
    ) -> Result<u64, StorageError> {
        let cutoff = now - chrono::Duration::hours(idle_hours as i64);
        let result = sqlx::query("DELETE FROM rate_limit_buckets WHERE last_refill < ?1")
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

    #[tokio::test]
    async fn first_request_from_new_bucket_is_admitted() {
        let db = setup_test_store().await;
        let cfg = QuotaConfig::default();
        let now = Utc::now();

        let mut wtx = db.store.begin_write().await.unwrap();
        let decision = QuotaRepository::check_and_spend(wtx.as_mut(), "b1", now, &cfg)
            .await
            .unwrap();
        wtx.commit().await.unwrap();

        assert!(decision.admitted);
        assert_eq!(decision.remaining, 499);
    }

    #[tokio::test]
    async fn denies_after_capacity_exhausted_within_window() {
        let db = setup_test_store().await;
        let cfg = QuotaConfig {
            capacity: 3,
            window_secs: 3600,
        };
        let now = Utc::now();

        for _ in 0..3 {
            let mut wtx = db.store.begin_write().await.unwrap();
            let decision = QuotaRepository::check_and_spend(wtx.as_mut(), "b2", now, &cfg)
                .await
                .unwrap();
            wtx.commit().await.unwrap();
            assert!(decision.admitted);
        }

        let mut wtx = db.store.begin_write().await.unwrap();
        let decision = QuotaRepository::check_and_spend(wtx.as_mut(), "b2", now, &cfg)
            .await
            .unwrap();
        wtx.commit().await.unwrap();
        assert!(!decision.admitted);
        assert_eq!(decision.remaining, 0);
    }

    #[tokio::test]
    async fn resets_after_window_elapses() {
        let db = setup_test_store().await;
        let cfg = QuotaConfig {
            capacity: 1,
            window_secs: 3600,
        };
        let now = Utc::now();

        let mut wtx = db.store.begin_write().await.unwrap();
        QuotaRepository::check_and_spend(wtx.as_mut(), "b3", now, &cfg)
            .await
            .unwrap();
        wtx.commit().await.unwrap();

        let later = now + chrono::Duration::seconds(3601);
        let mut wtx2 = db.store.begin_write().await.unwrap();
        let decision = QuotaRepository::check_and_spend(wtx2.as_mut(), "b3", later, &cfg)
            .await
            .unwrap();
        wtx2.commit().await.unwrap();

        assert!(decision.admitted);
        assert_eq!(decision.remaining, 0);
    }
}
