//! Segment Registry: an immutable directory of learnable segments.

use sqlx::{Sqlite, SqlitePool, Transaction};
use transit_eta_domain::Segment;

use crate::StorageError;

#[derive(Clone)]
pub struct SegmentRepository {
    read_pool: SqlitePool,
}

impl SegmentRepository {
    pub fn new(read_pool: SqlitePool) -> Self {
        Self { read_pool }
    }

    /// Looks up the stable `segment_id` for a natural key. Unknown tuples
    /// return `None`; callers turn that into an `invalid_segment` rejection.
    pub async fn lookup(
        &self,
        route_id: &str,
        direction_id: u8,
        from_stop_id: &str,
        to_stop_id: &str,
    ) -> Result<Option<i64>, StorageError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT segment_id FROM segments \
             WHERE route_id = ?1 AND direction_id = ?2 AND from_stop_id = ?3 AND to_stop_id = ?4",
        )
        .bind(route_id)
        .bind(direction_id as i64)
        .bind(from_stop_id)
        .bind(to_stop_id)
        .fetch_optional(&self.read_pool)
        .await
        .map_err(StorageError::Query)
    }

    /// Bootstrap seam for the (out-of-scope) bulk schedule importer: creates
    /// a segment if its natural key is not already registered, returning
    /// its `segment_id` either way. Never called from the ingestion or
    /// query paths.
    pub async fn import_segment(
        tx: &mut Transaction<'static, Sqlite>,
        route_id: &str,
        direction_id: u8,
        from_stop_id: &str,
        to_stop_id: &str,
    ) -> Result<i64, StorageError> {
        sqlx::query(
            "INSERT INTO segments (route_id, direction_id, from_stop_id, to_stop_id) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT (route_id, direction_id, from_stop_id, to_stop_id) DO NOTHING",
        )
        .bind(route_id)
        .bind(direction_id as i64)
        .bind(from_stop_id)
        .bind(to_stop_id)
        .execute(&mut **tx)
        .await
        .map_err(StorageError::Query)?;

        sqlx::query_scalar::<_, i64>(
            "SELECT segment_id FROM segments \
             WHERE route_id = ?1 AND direction_id = ?2 AND from_stop_id = ?3 AND to_stop_id = ?4",
        )
        .bind(route_id)
        .bind(direction_id as i64)
        .bind(from_stop_id)
        .bind(to_stop_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(StorageError::Query)
    }

    pub async fn get(&self, segment_id: i64) -> Result<Option<Segment>, StorageError> {
        sqlx::query_as::<_, SegmentRow>(
            "SELECT segment_id, route_id, direction_id, from_stop_id, to_stop_id \
             FROM segments WHERE segment_id = ?1",
        )
        .bind(segment_id)
        .fetch_optional(&self.read_pool)
        .await
        .map_err(StorageError::Query)
        .map(|row| row.map(Into::into))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SegmentRow {
    segment_id: i64,
    route_id: String,
    direction_id: i64,
    from_stop_id: String,
    to_stop_id: String,
}

impl From<SegmentRow> for Segment {
    fn from(row: SegmentRow) -> Self {
        Segment {
            segment_id: row.segment_id,
            route_id: row.route_id,
            direction_id: row.direction_id as u8,
            from_stop_id: row.from_stop_id,
            to_stop_id: row.to_stop_id,
        }
    }
}
