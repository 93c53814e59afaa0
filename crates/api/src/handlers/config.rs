//! `GET /v1/config` handler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use transit_eta_config::Tunables;

use crate::AppState;

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<Tunables> {
    Json(state.config.tunables())
}
