//! ETA Estimator: blends the learned mean with the schedule baseline and
//! derives confidence-aware percentiles from one `SegmentStat` cell.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::stats::{Confidence, SegmentStat};

#[derive(Debug, Clone, Copy)]
pub struct EstimatorConfig {
    /// Observation count at which the blend weight reaches `0.5`.
    pub n0: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self { n0: 20.0 }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EtaEstimate {
    pub eta_sec: f64,
    pub p50_sec: f64,
    pub p90_sec: f64,
    pub n: i64,
    pub blend_weight: f64,
    pub schedule_sec: f64,
    pub confidence: Confidence,
    pub bin_id: u16,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Reads one cell and blends the learned mean with the schedule baseline.
///
/// `w = n / (n + n0)`; pure schedule when `n = 0`. `p90` widens from the
/// standard `1.28` sigma margin to `1.5` under low/medium confidence.
pub fn estimate(stat: &SegmentStat, cfg: &EstimatorConfig) -> EtaEstimate {
    let n = stat.n as f64;
    let w = if stat.n == 0 { 0.0 } else { n / (n + cfg.n0) };
    let eta_sec = w * stat.m1 + (1.0 - w) * stat.schedule_mean_sec;

    let confidence = Confidence::from_n(stat.n);
    let sigma = stat.sigma();
    let c = match confidence {
        Confidence::High => 1.28,
        Confidence::Medium | Confidence::Low => 1.5,
    };

    EtaEstimate {
        eta_sec,
        p50_sec: eta_sec,
        p90_sec: eta_sec + c * sigma,
        n: stat.n,
        blend_weight: w,
        schedule_sec: stat.schedule_mean_sec,
        confidence,
        bin_id: stat.bin_id,
        last_updated: stat.last_update,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::{apply_observation, LearningConfig, Observation};

    #[test]
    fn cold_query_is_pure_schedule() {
        let stat = SegmentStat::seeded(1, 58, 320.0);
        let est = estimate(&stat, &EstimatorConfig::default());
        assert_eq!(est.eta_sec, 320.0);
        assert_eq!(est.n, 0);
        assert_eq!(est.blend_weight, 0.0);
        assert_eq!(est.confidence, Confidence::Low);
        assert_eq!(est.p90_sec, 320.0);
    }

    #[test]
    fn blend_weight_is_half_at_n0() {
        let mut stat = SegmentStat::seeded(1, 58, 320.0);
        let cfg = LearningConfig::default();
        let t0 = Utc::now();
        for i in 0..20 {
            apply_observation(
                &mut stat,
                Observation {
                    x: 280.0,
                    observed_at: t0 + chrono::Duration::seconds(i),
                },
                &cfg,
            )
            .unwrap();
        }

        let est = estimate(&stat, &EstimatorConfig::default());
        assert_eq!(est.n, 20);
        assert!((est.blend_weight - 0.5).abs() < 1e-9);
        assert!((est.eta_sec - 300.0).abs() < 1e-9);
        assert_eq!(est.confidence, Confidence::High);
    }

    #[test]
    fn blend_weight_tends_to_one_as_n_grows() {
        let mut stat = SegmentStat::seeded(1, 58, 320.0);
        let cfg = LearningConfig::default();
        let t0 = Utc::now();
        for i in 0..5000 {
            apply_observation(
                &mut stat,
                Observation {
                    x: 280.0,
                    observed_at: t0 + chrono::Duration::seconds(i),
                },
                &cfg,
            )
            .unwrap();
        }
        let est = estimate(&stat, &EstimatorConfig::default());
        assert!(est.blend_weight > 0.99);
    }
}
