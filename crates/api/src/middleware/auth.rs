//! Bearer-token auth for `POST /v1/ride_summary`.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use transit_eta_domain::DomainError;

use crate::AppState;

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Axum extractor that validates the shared bearer token.
///
/// Use this as a handler parameter instead of checking headers manually.
/// Handlers that declare `BearerAuth` as a parameter are automatically
/// protected.
pub struct BearerAuth;

impl FromRequestParts<Arc<AppState>> for BearerAuth {
    type Rejection = DomainError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let provided = extract_bearer(&parts.headers)
            .ok_or_else(|| DomainError::Unauthorized("missing bearer token".to_string()))?;

        if provided != state.config.bearer_token {
            return Err(DomainError::Unauthorized("invalid bearer token".to_string()));
        }

        Ok(Self)
    }
}
