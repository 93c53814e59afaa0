//! `GET /v1/health` handler. Always returns `200`.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use transit_eta_domain::HealthResponse;

use crate::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let db_ok = state.store.check_connection().await.is_ok();

    Json(HealthResponse {
        status: if db_ok { "ok" } else { "degraded" }.to_string(),
        db_ok,
        uptime_sec: state.start_time.elapsed().as_secs(),
    })
}
