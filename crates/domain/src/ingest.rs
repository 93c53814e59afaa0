//! Ingestion request/response shapes for `POST /v1/ride_summary`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// One client-computed stop-to-stop duration observation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SegmentObservation {
    #[validate(length(min = 1, max = 64))]
    pub from_stop_id: String,
    #[validate(length(min = 1, max = 64))]
    pub to_stop_id: String,
    /// Seconds. Structurally non-negative; the domain range `0 < x <= 7200`
    /// enforced by the Learning Updater is a per-segment business rejection,
    /// not a shape failure.
    #[validate(range(min = 0.0))]
    pub duration_sec: f64,
    #[validate(range(min = 0.0))]
    pub dwell_sec: Option<f64>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub mapmatch_conf: Option<f64>,
    pub observed_at: DateTime<Utc>,
    #[serde(default)]
    pub is_holiday: bool,
}

/// `POST /v1/ride_summary` request body.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RideSummaryRequest {
    #[validate(length(min = 1, max = 64))]
    pub route_id: String,
    pub direction_id: u8,
    #[validate(length(max = 128))]
    pub bucket_id: Option<String>,
    #[validate(length(min = 1), nested)]
    pub segments: Vec<SegmentObservation>,
}

/// Reason a single segment observation did not update the statistics store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    Outlier,
    LowConfidence,
    InvalidSegment,
    StaleTimestamp,
    TooManySegments,
}

/// Per-reason counts, always present in the response even at zero.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RejectedByReason {
    pub outlier: u32,
    pub low_confidence: u32,
    pub invalid_segment: u32,
    pub stale_timestamp: u32,
    pub too_many_segments: u32,
}

impl RejectedByReason {
    pub fn increment(&mut self, reason: RejectReason) {
        match reason {
            RejectReason::Outlier => self.outlier += 1,
            RejectReason::LowConfidence => self.low_confidence += 1,
            RejectReason::InvalidSegment => self.invalid_segment += 1,
            RejectReason::StaleTimestamp => self.stale_timestamp += 1,
            RejectReason::TooManySegments => self.too_many_segments += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.outlier
            + self.low_confidence
            + self.invalid_segment
            + self.stale_timestamp
            + self.too_many_segments
    }
}

/// `POST /v1/ride_summary` response body. Also the cached idempotent
/// replay payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideSummaryResponse {
    pub accepted_segments: u32,
    pub rejected_segments: u32,
    pub rejected_by_reason: RejectedByReason,
}

/// One rejected observation, persisted to the append-only rejection log.
#[derive(Debug, Clone)]
pub struct RejectionEntry {
    pub segment_id: Option<i64>,
    pub bin_id: Option<u16>,
    pub reason: RejectReason,
    pub observed_value: Option<f64>,
    pub bucket_id: String,
    pub timestamp: DateTime<Utc>,
}
