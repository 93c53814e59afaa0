//! `GET /v1/eta` query shape, health, and config response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct EtaQuery {
    pub route_id: String,
    pub direction_id: u8,
    pub from_stop_id: String,
    pub to_stop_id: String,
    pub when: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_holiday: bool,
}

/// Health check response. Always `200`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub db_ok: bool,
    pub uptime_sec: u64,
}
