//! `SegmentStat`: the online learning state for one `(segment_id, bin_id)` cell.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Online statistics for one segment x time-bin cell.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentStat {
    pub segment_id: i64,
    pub bin_id: u16,
    /// Number of accepted observations.
    pub n: i64,
    /// Running mean (Welford).
    pub m1: f64,
    /// Running sum of squared deviations (Welford).
    pub m2: f64,
    /// Exponentially-weighted mean, time-decayed.
    pub ema_mean: f64,
    /// Exponentially-weighted variance, time-decayed.
    pub ema_var: f64,
    /// Static schedule baseline seconds, seeded at import; always present
    /// for a queryable cell.
    pub schedule_mean_sec: f64,
    /// UTC instant of the last accepted observation's `observed_at`.
    pub last_update: Option<DateTime<Utc>>,
}

impl SegmentStat {
    /// A freshly-seeded cell with no observations yet.
    pub fn seeded(segment_id: i64, bin_id: u16, schedule_mean_sec: f64) -> Self {
        Self {
            segment_id,
            bin_id,
            n: 0,
            m1: 0.0,
            m2: 0.0,
            ema_mean: 0.0,
            ema_var: 0.0,
            schedule_mean_sec,
            last_update: None,
        }
    }

    /// Population standard deviation derived from the running moments.
    /// `0.0` when fewer than two observations have been accepted.
    pub fn sigma(&self) -> f64 {
        if self.n < 2 {
            0.0
        } else {
            (self.m2 / self.n as f64).sqrt()
        }
    }
}

/// Sample count bucketed into a confidence label, per spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn from_n(n: i64) -> Self {
        if n >= 8 {
            Confidence::High
        } else if n >= 3 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}
