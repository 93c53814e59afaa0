//! `POST /v1/ride_summary` handler.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use validator::Validate;

use transit_eta_domain::{DomainError, QuotaDecision, RideSummaryRequest};

use crate::middleware::auth::BearerAuth;
use crate::services::ingestion::{self, IngestResult};
use crate::AppState;

pub async fn ride_summary(
    State(state): State<Arc<AppState>>,
    _auth: BearerAuth,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: axum::http::HeaderMap,
    Json(raw_body): Json<Value>,
) -> Result<Response, DomainError> {
    let idem_key = headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| DomainError::InvalidRequest("missing Idempotency-Key header".to_string()))?
        .to_string();

    let req: RideSummaryRequest = serde_json::from_value(raw_body.clone())
        .map_err(|e| DomainError::InvalidRequest(e.to_string()))?;
    req.validate().map_err(DomainError::from_validation_errors)?;

    let bucket_id_hint = req.bucket_id.clone();
    let remote_addr = addr.ip().to_string();

    let outcome = ingestion::handle(
        &state,
        &idem_key,
        bucket_id_hint.as_deref(),
        &remote_addr,
        &raw_body,
        req,
    )
    .await?;

    Ok(match outcome {
        IngestResult::Replay { status_code, body } => {
            let status = StatusCode::from_u16(status_code).unwrap_or(StatusCode::OK);
            (status, Json(body)).into_response()
        }
        IngestResult::Success { response, quota } => {
            let mut resp = (StatusCode::OK, Json(response)).into_response();
            if let Some(quota) = quota {
                attach_rate_limit_headers(&mut resp, &quota);
            }
            resp
        }
    })
}

fn attach_rate_limit_headers(resp: &mut Response, quota: &QuotaDecision) {
    let headers = resp.headers_mut();
    headers.insert(
        "X-RateLimit-Limit",
        HeaderValue::from_str(&quota.limit.to_string()).unwrap(),
    );
    headers.insert(
        "X-RateLimit-Remaining",
        HeaderValue::from_str(&quota.remaining.to_string()).unwrap(),
    );
    headers.insert(
        "X-RateLimit-Reset",
        HeaderValue::from_str(&quota.reset_unix.to_string()).unwrap(),
    );
}
