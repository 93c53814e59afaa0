//! Idempotency Registry: an at-most-once gate keyed by a client token,
//! guarded by a body-hash tamper check.

use chrono::{DateTime, Duration, Utc};
use sqlx::{Row, Sqlite, Transaction};
use transit_eta_domain::idempotency::{BodyHash, IdemOutcome};

use crate::StorageError;

pub struct IdempotencyRepository;

impl IdempotencyRepository {
    /// Reserves `idem_key` inside the open transaction, or reports a replay
    /// / conflict against a previously-committed record. Writing the
    /// reservation and the eventual response inside the same transaction
    /// as the stats update means a crash mid-request leaves no row at all
    /// (the insert rolls back with everything else), never a ghost that
    /// blocks retries.
    pub async fn begin(
        tx: &mut Transaction<'static, Sqlite>,
        idem_key: &str,
        body_hash: &BodyHash,
        now: DateTime<Utc>,
    ) -> Result<IdemOutcome, StorageError> {
        let existing = sqlx::query(
            "SELECT body_hash, status_code, response_json FROM idempotency_keys WHERE idem_key = ?1",
        )
        .bind(idem_key)
        .fetch_optional(&mut **tx)
        .await
        .map_err(StorageError::Query)?;

        if let Some(row) = existing {
            let existing_hash: Vec<u8> = row.get("body_hash");
            if existing_hash.as_slice() == body_hash.as_slice() {
                let status_code: i64 = row.get("status_code");
                let response_json: String = row.get("response_json");
                let response = serde_json::from_str(&response_json)
                    .map_err(|e| StorageError::Query(sqlx::Error::Decode(Box::new(e))))?;
                return Ok(IdemOutcome::ReplayOf {
                    status_code: status_code as u16,
                    response,
                });
            }
            return Ok(IdemOutcome::Conflict);
        }

        sqlx::query(
            "INSERT INTO idempotency_keys (idem_key, body_hash, accepted_at) VALUES (?1, ?2, ?3)",
        )
        .bind(idem_key)
        .bind(body_hash.as_slice())
        .bind(now.to_rfc3339())
        .execute(&mut **tx)
        .await
        .map_err(StorageError::Query)?;

        Ok(IdemOutcome::Fresh)
    }

    /// Attaches the final response to a previously-reserved record.
    pub async fn commit(
        tx: &mut Transaction<'static, Sqlite>,
        idem_key: &str,
        status_code: u16,
        response: &serde_json::Value,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE idempotency_keys SET status_code = ?1, response_json = ?2 WHERE idem_key = ?3",
        )
        .bind(status_code as i64)
        .bind(response.to_string())
        .bind(idem_key)
        .execute(&mut **tx)
        .await
        .map_err(StorageError::Query)?;

        Ok(())
    }

    /// Deletes records older than the idempotency TTL.
    pub async fn sweep(
        tx: &mut Transaction<'static, Sqlite>,
        now: DateTime<Utc>,
        ttl_hours: u32,
    ) -> Result<u64, StorageError> {
        let cutoff = now - Duration::hours(ttl_hours as i64);
        let result = sqlx::query("DELETE FROM idempotency_keys WHERE accepted_at < ?1")
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
    use serde_json::json;
    use transit_eta_domain::idempotency::hash_body;

    #[tokio::test]
    async fn fresh_key_then_replay_then_conflict() {
        let db = setup_test_store().await;
        let body_a = json!({"route_id": "R1"});
        let body_b = json!({"route_id": "R2"});
        let hash_a = hash_body(&body_a);
        let hash_b = hash_body(&body_b);
        let now = Utc::now();

        let mut wtx = db.store.begin_write().await.unwrap();
        let outcome = IdempotencyRepository::begin(wtx.as_mut(), "K1", &hash_a, now)
            .await
            .unwrap();
        assert!(matches!(outcome, IdemOutcome::Fresh));
        IdempotencyRepository::commit(wtx.as_mut(), "K1", 200, &json!({"accepted_segments": 1}))
            .await
            .unwrap();
        wtx.commit().await.unwrap();

        let mut wtx2 = db.store.begin_write().await.unwrap();
        let replay = IdempotencyRepository::begin(wtx2.as_mut(), "K1", &hash_a, now)
            .await
            .unwrap();
        match replay {
            IdemOutcome::ReplayOf { status_code, response } => {
                assert_eq!(status_code, 200);
                assert_eq!(response, json!({"accepted_segments": 1}));
            }
            other => panic!("expected replay, got {other:?}"),
        }
        wtx2.rollback().await.unwrap();

        let mut wtx3 = db.store.begin_write().await.unwrap();
        let conflict = IdempotencyRepository::begin(wtx3.as_mut(), "K1", &hash_b, now)
            .await
            .unwrap();
        assert!(matches!(conflict, IdemOutcome::Conflict));
        wtx3.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn sweep_removes_only_stale_rows() {
        let db = setup_test_store().await;
        let now = Utc::now();
        let hash = hash_body(&json!({}));

        let mut wtx = db.store.begin_write().await.unwrap();
        IdempotencyRepository::begin(wtx.as_mut(), "OLD", &hash, now - Duration::hours(48))
            .await
            .unwrap();
        IdempotencyRepository::begin(wtx.as_mut(), "NEW", &hash, now)
            .await
            .unwrap();
        let removed = IdempotencyRepository::sweep(wtx.as_mut(), now, 24).await.unwrap();
        wtx.commit().await.unwrap();

        assert_eq!(removed, 1);
    }
}
