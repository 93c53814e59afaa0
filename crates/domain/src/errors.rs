//! Error taxonomy with HTTP status code mappings, per the machine-readable
//! codes in the ride-summary ingestion contract.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

/// Domain errors with their HTTP status code mapping.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    /// Shape, types, or range failure (400).
    #[error("invalid_request: {0}")]
    InvalidRequest(String),

    /// Multiple shape/range failures at once (400).
    #[error("invalid_request")]
    InvalidRequestErrors(Vec<String>),

    /// Missing or invalid bearer credential (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Same idempotency key, different body hash (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Semantic failure detected at request granularity (422).
    #[error("unprocessable: {0}")]
    Unprocessable(String),

    /// Quota denied (429).
    #[error("rate_limited")]
    RateLimited {
        limit: u32,
        remaining: u32,
        reset_unix: i64,
    },

    /// Segment/bin absent in the registry (404).
    #[error("not_found: {0}")]
    NotFound(String),

    /// Storage or internal failure (500).
    #[error("server_error")]
    ServerError(#[from] anyhow::Error),

    /// Writer lock was not acquired within the busy timeout (500, retryable).
    #[error("server_error: storage busy")]
    StorageBusy,
}

impl DomainError {
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::InvalidRequest(_) | DomainError::InvalidRequestErrors(_) => {
                "invalid_request"
            }
            DomainError::Unauthorized(_) => "unauthorized",
            DomainError::Conflict(_) => "conflict",
            DomainError::Unprocessable(_) => "unprocessable",
            DomainError::RateLimited { .. } => "rate_limited",
            DomainError::NotFound(_) => "not_found",
            DomainError::ServerError(_) | DomainError::StorageBusy => "server_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            DomainError::InvalidRequest(_) | DomainError::InvalidRequestErrors(_) => {
                StatusCode::BAD_REQUEST
            }
            DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DomainError::Conflict(_) => StatusCode::CONFLICT,
            DomainError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DomainError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::ServerError(_) | DomainError::StorageBusy => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn from_validation_errors(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| {
                    format!(
                        "{}: {}",
                        field,
                        error
                            .message
                            .as_ref()
                            .unwrap_or(&std::borrow::Cow::Borrowed("validation failed"))
                    )
                })
            })
            .collect();

        if messages.is_empty() {
            DomainError::InvalidRequest("invalid input".to_string())
        } else {
            DomainError::InvalidRequestErrors(messages)
        }
    }
}

impl IntoResponse for DomainError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if matches!(self, DomainError::ServerError(_) | DomainError::StorageBusy) {
            tracing::error!(code = self.code(), "{}", self);
        }

        if let DomainError::RateLimited {
            limit,
            remaining,
            reset_unix,
        } = &self
        {
            let body = ErrorResponse {
                error: self.code().to_string(),
                details: None,
            };
            let mut resp = (status, Json(body)).into_response();
            let headers = resp.headers_mut();
            headers.insert(
                "X-RateLimit-Limit",
                axum::http::HeaderValue::from_str(&limit.to_string()).unwrap(),
            );
            headers.insert(
                "X-RateLimit-Remaining",
                axum::http::HeaderValue::from_str(&remaining.to_string()).unwrap(),
            );
            headers.insert(
                "X-RateLimit-Reset",
                axum::http::HeaderValue::from_str(&reset_unix.to_string()).unwrap(),
            );
            return resp;
        }

        let body = match &self {
            DomainError::InvalidRequestErrors(details) => ErrorResponse {
                error: "invalid_request".to_string(),
                details: Some(details.clone()),
            },
            _ => ErrorResponse {
                error: self.code().to_string(),
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::ServerError(anyhow::anyhow!(err))
    }
}
