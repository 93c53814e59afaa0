//! Learning Updater: applies one observation to one `SegmentStat` cell.
//!
//! Combines Welford's numerically-stable online mean/variance with a
//! time-decayed exponential moving mean/variance, and enforces the
//! outlier-rejection policy ahead of either update.

use chrono::{DateTime, Utc};

use crate::stats::SegmentStat;

#[derive(Debug, Clone, Copy)]
pub struct LearningConfig {
    /// Outlier rejection threshold in standard deviations.
    pub outlier_sigma: f64,
    /// EMA half-life, in days.
    pub half_life_days: f64,
    /// EMA base smoothing factor applied when `Delta t` equals the half-life.
    pub ema_alpha_base: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            outlier_sigma: 3.0,
            half_life_days: 30.0,
            ema_alpha_base: 0.1,
        }
    }
}

/// A duration observation accepted by §4.8's upstream gates, ready to be
/// applied to a stat cell.
#[derive(Debug, Clone, Copy)]
pub struct Observation {
    /// Duration in seconds, `0 < x <= 7200`.
    pub x: f64,
    pub observed_at: DateTime<Utc>,
}

/// An observation was rejected before it could be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutlierRejected;

/// Applies `obs` to `stat`, in place, unless it is rejected as an outlier.
///
/// Outlier test: reject iff `n > 5` and `|x - m1| > k*sigma`, where `k` is
/// `cfg.outlier_sigma`. `n <= 1` never rejects (sigma undefined at `n=1`,
/// and by extension the `n>5` guard already excludes small samples).
pub fn apply_observation(
    stat: &mut SegmentStat,
    obs: Observation,
    cfg: &LearningConfig,
) -> Result<(), OutlierRejected> {
    if stat.n > 5 {
        let sigma = stat.sigma();
        if (obs.x - stat.m1).abs() > cfg.outlier_sigma * sigma {
            return Err(OutlierRejected);
        }
    }

    apply_welford(stat, obs.x);
    apply_ema(stat, obs, cfg);
    stat.last_update = Some(obs.observed_at);

    Ok(())
}

fn apply_welford(stat: &mut SegmentStat, x: f64) {
    let n_prime = stat.n + 1;
    let d = x - stat.m1;
    let m1_prime = stat.m1 + d / n_prime as f64;
    let d2 = x - m1_prime;
    let m2_prime = stat.m2 + d * d2;

    stat.n = n_prime;
    stat.m1 = m1_prime;
    stat.m2 = m2_prime;
}

fn apply_ema(stat: &mut SegmentStat, obs: Observation, cfg: &LearningConfig) {
    if stat.n == 1 {
        // First accepted observation for this cell (Welford already ran).
        stat.ema_mean = obs.x;
        stat.ema_var = 0.0;
        return;
    }

    let delta_t_secs = stat
        .last_update
        .map(|last| (obs.observed_at - last).num_seconds().max(0))
        .unwrap_or(0) as f64;
    let half_life_secs = cfg.half_life_days * 86_400.0;
    let alpha_eff = 1.0 - (1.0 - cfg.ema_alpha_base).powf(delta_t_secs / half_life_secs);

    let ema_mean_prime = alpha_eff * obs.x + (1.0 - alpha_eff) * stat.ema_mean;
    let diff = obs.x - ema_mean_prime;
    stat.ema_var = alpha_eff * diff * diff + (1.0 - alpha_eff) * stat.ema_var;
    stat.ema_mean = ema_mean_prime;
}
