//! Statistics Store: sparse `(segment_id, bin_id)` online learning state.

use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use transit_eta_domain::SegmentStat;

use crate::StorageError;

#[derive(Clone)]
pub struct StatsRepository {
    read_pool: SqlitePool,
}

impl StatsRepository {
    pub fn new(read_pool: SqlitePool) -> Self {
        Self { read_pool }
    }

    /// Read path for `GET /v1/eta`. `None` means the cell has never been
    /// seeded with a schedule baseline — the caller returns `not_found`.
    pub async fn get(&self, segment_id: i64, bin_id: u16) -> Result<Option<SegmentStat>, StorageError> {
        let row = sqlx::query(
            "SELECT segment_id, bin_id, n, m1, m2, ema_mean, ema_var, schedule_mean_sec, last_update \
             FROM segment_stats WHERE segment_id = ?1 AND bin_id = ?2",
        )
        .bind(segment_id)
        .bind(bin_id as i64)
        .fetch_optional(&self.read_pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(row.map(row_to_stat))
    }

    /// Write-path read: fetches the current cell inside an open write
    /// transaction, ahead of a read-modify-write by the Learning Updater.
    pub async fn get_for_update(
        tx: &mut Transaction<'static, Sqlite>,
        segment_id: i64,
        bin_id: u16,
    ) -> Result<Option<SegmentStat>, StorageError> {
        let row = sqlx::query(
            "SELECT segment_id, bin_id, n, m1, m2, ema_mean, ema_var, schedule_mean_sec, last_update \
             FROM segment_stats WHERE segment_id = ?1 AND bin_id = ?2",
        )
        .bind(segment_id)
        .bind(bin_id as i64)
        .fetch_optional(&mut **tx)
        .await
        .map_err(StorageError::Query)?;

        Ok(row.map(row_to_stat))
    }

    /// Persists the new state of one cell inside the enclosing transaction.
    pub async fn apply_update(
        tx: &mut Transaction<'static, Sqlite>,
        stat: &SegmentStat,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE segment_stats SET n = ?1, m1 = ?2, m2 = ?3, ema_mean = ?4, ema_var = ?5, last_update = ?6 \
             WHERE segment_id = ?7 AND bin_id = ?8",
        )
        .bind(stat.n)
        .bind(stat.m1)
        .bind(stat.m2)
        .bind(stat.ema_mean)
        .bind(stat.ema_var)
        .bind(stat.last_update.map(|t| t.to_rfc3339()))
        .bind(stat.segment_id)
        .bind(stat.bin_id as i64)
        .execute(&mut **tx)
        .await
        .map_err(StorageError::Query)?;

        Ok(())
    }

    /// Bootstrap seam for the (out-of-scope) schedule importer: seeds one
    /// cell with its schedule baseline if it is not already present.
    pub async fn seed_schedule(
        tx: &mut Transaction<'static, Sqlite>,
        segment_id: i64,
        bin_id: u16,
        schedule_mean_sec: f64,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO segment_stats (segment_id, bin_id, schedule_mean_sec) VALUES (?1, ?2, ?3) \
             ON CONFLICT (segment_id, bin_id) DO NOTHING",
        )
        .bind(segment_id)
        .bind(bin_id as i64)
        .bind(schedule_mean_sec)
        .execute(&mut **tx)
        .await
        .map_err(StorageError::Query)?;

        Ok(())
    }
}

fn row_to_stat(row: sqlx::sqlite::SqliteRow) -> SegmentStat {
    let last_update: Option<String> = row.get("last_update");
    SegmentStat {
        segment_id: row.get("segment_id"),
        bin_id: row.get::<i64, _>("bin_id") as u16,
        n: row.get("n"),
        m1: row.get("m1"),
        m2: row.get("m2"),
        ema_mean: row.get("ema_mean"),
        ema_var: row.get("ema_var"),
        schedule_mean_sec: row.get("schedule_mean_sec"),
        last_update: last_update.and_then(|s| DateTime::parse_from_rfc3339(&s).ok().map(|t| t.with_timezone(&Utc))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment_repository::SegmentRepository;
    use crate::test_support::setup_test_store;

    #[tokio::test]
    async fn unseeded_cell_is_not_found() {
        let db = setup_test_store().await;
        let repo = StatsRepository::new(db.store.read_pool().clone());
        assert!(repo.get(1, 58).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn seed_then_apply_update_round_trips() {
        let db = setup_test_store().await;
        let repo = StatsRepository::new(db.store.read_pool().clone());

        let mut wtx = db.store.begin_write().await.unwrap();
        let segment_id = SegmentRepository::import_segment(wtx.as_mut(), "R1", 0, "S1", "S2")
            .await
            .unwrap();
        StatsRepository::seed_schedule(wtx.as_mut(), segment_id, 58, 320.0)
            .await
            .unwrap();
        wtx.commit().await.unwrap();

        let seeded = repo.get(segment_id, 58).await.unwrap().unwrap();
        assert_eq!(seeded.n, 0);
        assert_eq!(seeded.schedule_mean_sec, 320.0);

        let mut updated = seeded.clone();
        updated.n = 1;
        updated.m1 = 280.0;
        updated.last_update = Some(Utc::now());

        let mut wtx2 = db.store.begin_write().await.unwrap();
        StatsRepository::apply_update(wtx2.as_mut(), &updated)
            .await
            .unwrap();
        wtx2.commit().await.unwrap();

        let refetched = repo.get(segment_id, 58).await.unwrap().unwrap();
        assert_eq!(refetched.n, 1);
        assert_eq!(refetched.m1, 280.0);
        assert_eq!(refetched.schedule_mean_sec, 320.0);
    }
}
