//! `GET /v1/eta` handler.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;

use transit_eta_domain::{bin_of, estimate, DomainError, EstimatorConfig, EtaEstimate, EtaQuery};

use crate::AppState;

pub async fn get_eta(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EtaQuery>,
) -> Result<Json<EtaEstimate>, DomainError> {
    let segment_id = state
        .segment_repo
        .lookup(
            &query.route_id,
            query.direction_id,
            &query.from_stop_id,
            &query.to_stop_id,
        )
        .await?
        .ok_or_else(|| DomainError::NotFound("unknown segment".to_string()))?;

    let when = query.when.unwrap_or_else(Utc::now);
    let bin_id = bin_of(when, query.is_holiday);

    let stat = state
        .stats_repo
        .get(segment_id, bin_id)
        .await?
        .ok_or_else(|| DomainError::NotFound("no schedule baseline for this segment/bin".to_string()))?;

    let cfg = EstimatorConfig { n0: state.config.n0 };
    Ok(Json(estimate(&stat, &cfg)))
}
