//! Transit ETA backend server library.

pub mod handlers;
pub mod middleware;
pub mod services;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use transit_eta_config::AppConfig;
use transit_eta_storage::{SegmentRepository, StatsRepository, Store};

use handlers::config::get_config;
use handlers::eta::get_eta;
use handlers::health::health;
use handlers::ingest::ride_summary;

/// Application state shared across handlers.
pub struct AppState {
    pub store: Arc<Store>,
    pub segment_repo: SegmentRepository,
    pub stats_repo: StatsRepository,
    pub config: AppConfig,
    pub start_time: Instant,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/config", get(get_config))
        .route("/v1/eta", get(get_eta))
        .route("/v1/ride_summary", post(ride_summary))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
