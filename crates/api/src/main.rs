//! Transit ETA backend server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transit_eta_api::{build_router, AppState};
use transit_eta_config::AppConfig;
use transit_eta_storage::{
    IdempotencyRepository, QuotaRepository, RejectionRepository, RideAuditRepository,
    SegmentRepository, StatsRepository, Store,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting transit ETA server...");

    let config = AppConfig::from_env()?;
    tracing::info!("Binding to {}", config.bind_address);

    let store = Arc::new(
        Store::open(
            &config.database_path,
            Duration::from_millis(config.busy_timeout_ms),
        )
        .await?,
    );
    tracing::info!("Database opened at {}", config.database_path);

    let segment_repo = SegmentRepository::new(store.read_pool().clone());
    let stats_repo = StatsRepository::new(store.read_pool().clone());

    spawn_retention_sweep(store.clone(), config.clone());

    let state = Arc::new(AppState {
        store,
        segment_repo,
        stats_repo,
        config: config.clone(),
        start_time: Instant::now(),
    });

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    tracing::info!("Server listening on {}", config.bind_address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Periodically sweeps aged-out idempotency keys, quota buckets, and
/// retention-bound logs. Runs in its own write transaction, separate from
/// request-serving ones, so a slow sweep never blocks the ingestion path
/// beyond the single-writer queue's normal turn-taking.
fn spawn_retention_sweep(store: Arc<Store>, config: AppConfig) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            let now = Utc::now();

            let result: Result<(), transit_eta_storage::StorageError> = async {
                let mut wtx = store.begin_write().await?;
                IdempotencyRepository::sweep(wtx.as_mut(), now, config.idempotency_ttl_hours).await?;
                QuotaRepository::sweep(wtx.as_mut(), now, 24).await?;
                RejectionRepository::sweep(wtx.as_mut(), now, config.rejection_retention_days).await?;
                RideAuditRepository::sweep(wtx.as_mut(), now, config.ride_audit_retention_days).await?;
                wtx.commit().await?;
                Ok(())
            }
            .await;

            if let Err(err) = result {
                tracing::warn!("retention sweep failed: {}", err);
            }
        }
    });
}
