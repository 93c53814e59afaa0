//! Quota Gate domain types: a persistent, per-bucket token bucket.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy)]
pub struct QuotaConfig {
    pub capacity: u32,
    pub window_secs: i64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            capacity: 500,
            window_secs: 3600,
        }
    }
}

/// Outcome of an atomic check-and-spend against one bucket.
#[derive(Debug, Clone, Copy)]
pub struct QuotaDecision {
    pub admitted: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_unix: i64,
}

/// Derives the client-presented bucket id, falling back to the peer
/// address when absent or malformed.
pub fn resolve_bucket_id(presented: Option<&str>, remote_addr: &str) -> String {
    match presented {
        Some(id) if !id.trim().is_empty() && id.len() <= 128 => id.to_string(),
        _ => format!("ip:{remote_addr}"),
    }
}

/// Binary refill token-bucket arithmetic, factored out of the storage
/// layer so it can be unit tested without a database.
///
/// If `now - last_refill >= window`, the bucket resets to `capacity` before
/// debiting. Otherwise it debits only if tokens remain.
pub fn apply_refill_and_debit(
    tokens: u32,
    last_refill: DateTime<Utc>,
    now: DateTime<Utc>,
    cfg: &QuotaConfig,
) -> (bool, u32, DateTime<Utc>) {
    let elapsed = (now - last_refill).num_seconds();
    let (tokens, last_refill) = if elapsed >= cfg.window_secs {
        (cfg.capacity, now)
    } else {
        (tokens, last_refill)
    };

    if tokens > 0 {
        (true, tokens - 1, last_refill)
    } else {
        (false, tokens, last_refill)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn debits_when_tokens_available() {
        let now = Utc::now();
        let cfg = QuotaConfig::default();
        let (admitted, remaining, _) = apply_refill_and_debit(500, now, now, &cfg);
        assert!(admitted);
        assert_eq!(remaining, 499);
    }

    #[test]
    fn denies_at_zero_tokens_within_window() {
        let now = Utc::now();
        let cfg = QuotaConfig::default();
        let (admitted, remaining, _) = apply_refill_and_debit(0, now - Duration::minutes(30), now, &cfg);
        assert!(!admitted);
        assert_eq!(remaining, 0);
    }

    #[test]
    fn resets_after_window_elapses() {
        let now = Utc::now();
        let cfg = QuotaConfig::default();
        let last_refill = now - Duration::seconds(cfg.window_secs);
        let (admitted, remaining, new_refill) = apply_refill_and_debit(0, last_refill, now, &cfg);
        assert!(admitted);
        assert_eq!(remaining, 499);
        assert_eq!(new_refill, now);
    }

    #[test]
    fn bucket_id_falls_back_to_ip_when_absent() {
        assert_eq!(resolve_bucket_id(None, "10.0.0.1"), "ip:10.0.0.1");
        assert_eq!(resolve_bucket_id(Some("  "), "10.0.0.1"), "ip:10.0.0.1");
        assert_eq!(resolve_bucket_id(Some("abc"), "10.0.0.1"), "abc");
    }
}
