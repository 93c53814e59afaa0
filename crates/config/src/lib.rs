//! Configuration module for the transit ETA service.

use serde::Serialize;
use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Learning and blending tunables, also surfaced verbatim on `GET /v1/config`.
#[derive(Debug, Clone, Serialize)]
pub struct Tunables {
    /// Blend-weight half-point: observations needed for `w = 0.5`.
    pub n0: f64,
    pub time_bin_minutes: u32,
    pub half_life_days: f64,
    pub ema_alpha_base: f64,
    pub outlier_sigma: f64,
    pub mapmatch_min_conf: f64,
    pub max_segments_per_ride: usize,
    pub rate_limit_per_hour: u32,
    pub idempotency_ttl_hours: u32,
    pub schedule_feed_version: String,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path to the embedded SQLite database file.
    pub database_path: String,
    /// Shared bearer token required on `POST /v1/ride_summary`.
    pub bearer_token: String,
    /// Address to bind the server to.
    pub bind_address: String,
    /// Bound on how long a writer waits for the single-writer lock before
    /// surfacing a retryable `server_error` (milliseconds).
    pub busy_timeout_ms: u64,

    pub n0: f64,
    pub ema_alpha_base: f64,
    pub half_life_days: f64,
    pub outlier_sigma: f64,
    pub mapmatch_min_conf: f64,
    pub max_segments_per_ride: usize,
    pub rate_limit_per_hour: u32,
    pub idempotency_ttl_hours: u32,

    /// Age beyond which a `RejectionEntry` is swept, in days.
    pub rejection_retention_days: u32,
    /// Age beyond which a `RideAudit` row is swept, in days.
    pub ride_audit_retention_days: u32,

    /// Opaque version tag for the currently loaded schedule feed.
    pub schedule_feed_version: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_path: env_var_or("DATABASE_PATH", "./transit_eta.db"),
            bearer_token: env_var("BEARER_TOKEN")?,
            bind_address: env_var_or("BIND_ADDRESS", "0.0.0.0:8080"),
            busy_timeout_ms: env_var_parsed_or("BUSY_TIMEOUT_MS", 5_000)?,

            n0: env_var_parsed_or("N0", 20.0)?,
            ema_alpha_base: env_var_parsed_or("EMA_ALPHA_BASE", 0.1)?,
            half_life_days: env_var_parsed_or("HALF_LIFE_DAYS", 30.0)?,
            outlier_sigma: env_var_parsed_or("OUTLIER_SIGMA", 3.0)?,
            mapmatch_min_conf: env_var_parsed_or("MAPMATCH_MIN_CONF", 0.7)?,
            max_segments_per_ride: env_var_parsed_or("MAX_SEGMENTS_PER_RIDE", 50)?,
            rate_limit_per_hour: env_var_parsed_or("RATE_LIMIT_PER_HOUR", 500)?,
            idempotency_ttl_hours: env_var_parsed_or("IDEMPOTENCY_TTL_HOURS", 24)?,

            rejection_retention_days: env_var_parsed_or("REJECTION_RETENTION_DAYS", 30)?,
            ride_audit_retention_days: env_var_parsed_or("RIDE_AUDIT_RETENTION_DAYS", 90)?,

            schedule_feed_version: env_var_or("SCHEDULE_FEED_VERSION", "unset"),
        })
    }

    pub fn tunables(&self) -> Tunables {
        Tunables {
            n0: self.n0,
            time_bin_minutes: 15,
            half_life_days: self.half_life_days,
            ema_alpha_base: self.ema_alpha_base,
            outlier_sigma: self.outlier_sigma,
            mapmatch_min_conf: self.mapmatch_min_conf,
            max_segments_per_ride: self.max_segments_per_ride,
            rate_limit_per_hour: self.rate_limit_per_hour,
            idempotency_ttl_hours: self.idempotency_ttl_hours,
            schedule_feed_version: self.schedule_feed_version.clone(),
        }
    }
}

fn env_var(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

fn env_var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_var_parsed_or<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string(), raw)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_or_uses_default() {
        let val = env_var_or("NON_EXISTENT_VAR_12345", "default_value");
        assert_eq!(val, "default_value");
    }

    #[test]
    fn test_env_var_parsed_or_falls_back_on_missing() {
        let val: f64 = env_var_parsed_or("NON_EXISTENT_VAR_67890", 3.0).unwrap();
        assert_eq!(val, 3.0);
    }

    #[test]
    fn test_env_var_parsed_or_rejects_garbage() {
        unsafe {
            env::set_var("TRANSIT_ETA_TEST_BAD_FLOAT", "not-a-number");
        }
        let err = env_var_parsed_or::<f64>("TRANSIT_ETA_TEST_BAD_FLOAT", 1.0).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_, _)));
        unsafe {
            env::remove_var("TRANSIT_ETA_TEST_BAD_FLOAT");
        }
    }
}
