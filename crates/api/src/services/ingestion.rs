//! Ingestion Orchestrator: the request-shaped unit of work behind
//! `POST /v1/ride_summary`. Validates, gates (idempotency + quota), fans
//! over segments in submission order, and commits or rolls back as one
//! transaction so stats, idempotency, and quota never drift apart.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use transit_eta_domain::{
    apply_observation, bin_of, hash_body, resolve_bucket_id, DomainError, IdemOutcome,
    LearningConfig, Observation, OutlierRejected, QuotaConfig, QuotaDecision, RejectReason,
    RejectedByReason, RejectionEntry, RideSummaryRequest, RideSummaryResponse, SegmentObservation,
};
use transit_eta_storage::{
    IdempotencyRepository, QuotaRepository, RejectionRepository, RideAuditRepository,
    SegmentRepository, StatsRepository, WriteTx,
};

use crate::AppState;

/// Outcome of a fully-processed ingestion request.
pub enum IngestResult {
    /// A previously-committed response, returned verbatim.
    Replay { status_code: u16, body: Value },
    /// A freshly-processed request.
    Success {
        response: RideSummaryResponse,
        quota: Option<QuotaDecision>,
    },
}

pub async fn handle(
    state: &AppState,
    idem_key: &str,
    bucket_id_hint: Option<&str>,
    remote_addr: &str,
    raw_body: &Value,
    req: RideSummaryRequest,
) -> Result<IngestResult, DomainError> {
    let now = Utc::now();

    // Too many segments is reported as a single rejection rather than a
    // shape error, and never opens a transaction.
    if req.segments.len() > state.config.max_segments_per_ride {
        let mut rejected_by_reason = RejectedByReason::default();
        rejected_by_reason.increment(RejectReason::TooManySegments);
        return Ok(IngestResult::Success {
            response: RideSummaryResponse {
                accepted_segments: 0,
                rejected_segments: 1,
                rejected_by_reason,
            },
            quota: None,
        });
    }

    let body_hash = hash_body(raw_body);
    let mut wtx = state.store.begin_write().await?;

    match IdempotencyRepository::begin(wtx.as_mut(), idem_key, &body_hash, now).await? {
        IdemOutcome::ReplayOf {
            status_code,
            response,
        } => {
            wtx.rollback().await?;
            return Ok(IngestResult::Replay {
                status_code,
                body: response,
            });
        }
        IdemOutcome::Conflict => {
            wtx.rollback().await?;
            return Err(DomainError::Conflict(
                "idempotency key already used with a different request body".to_string(),
            ));
        }
        IdemOutcome::Fresh => {}
    }

    let bucket_id = resolve_bucket_id(bucket_id_hint, remote_addr);
    let quota_cfg = QuotaConfig {
        capacity: state.config.rate_limit_per_hour,
        window_secs: 3600,
    };
    let decision = QuotaRepository::check_and_spend(wtx.as_mut(), &bucket_id, now, &quota_cfg).await?;
    if !decision.admitted {
        wtx.rollback().await?;
        return Err(DomainError::RateLimited {
            limit: decision.limit,
            remaining: decision.remaining,
            reset_unix: decision.reset_unix,
        });
    }

    let learning_cfg = LearningConfig {
        outlier_sigma: state.config.outlier_sigma,
        half_life_days: state.config.half_life_days,
        ema_alpha_base: state.config.ema_alpha_base,
    };

    let mut accepted_segments = 0u32;
    let mut rejected_by_reason = RejectedByReason::default();

    for seg in &req.segments {
        if let Some(reason) = pre_lookup_reject_reason(seg, now, state.config.mapmatch_min_conf) {
            reject(
                &mut wtx,
                &mut rejected_by_reason,
                None,
                None,
                reason,
                Some(seg.duration_sec),
                &bucket_id,
                now,
            )
            .await?;
            continue;
        }

        let segment_id = match state
            .segment_repo
            .lookup(&req.route_id, req.direction_id, &seg.from_stop_id, &seg.to_stop_id)
            .await?
        {
            Some(id) => id,
            None => {
                reject(
                    &mut wtx,
                    &mut rejected_by_reason,
                    None,
                    None,
                    RejectReason::InvalidSegment,
                    Some(seg.duration_sec),
                    &bucket_id,
                    now,
                )
                .await?;
                continue;
            }
        };

        let bin_id = bin_of(seg.observed_at, seg.is_holiday);

        let mut stat = match StatsRepository::get_for_update(wtx.as_mut(), segment_id, bin_id).await? {
            Some(stat) => stat,
            None => {
                reject(
                    &mut wtx,
                    &mut rejected_by_reason,
                    Some(segment_id),
                    Some(bin_id),
                    RejectReason::InvalidSegment,
                    Some(seg.duration_sec),
                    &bucket_id,
                    now,
                )
                .await?;
                continue;
            }
        };

        if !(seg.duration_sec > 0.0 && seg.duration_sec <= 7200.0) {
            reject(
                &mut wtx,
                &mut rejected_by_reason,
                Some(segment_id),
                Some(bin_id),
                RejectReason::InvalidSegment,
                Some(seg.duration_sec),
                &bucket_id,
                now,
            )
            .await?;
            continue;
        }

        let observation = Observation {
            x: seg.duration_sec,
            observed_at: seg.observed_at,
        };

        match apply_observation(&mut stat, observation, &learning_cfg) {
            Ok(()) => {
                StatsRepository::apply_update(wtx.as_mut(), &stat).await?;
                RideAuditRepository::insert(
                    wtx.as_mut(),
                    segment_id,
                    bin_id,
                    seg.duration_sec,
                    &bucket_id,
                    seg.observed_at,
                    now,
                )
                .await?;
                accepted_segments += 1;
            }
            Err(OutlierRejected) => {
                reject(
                    &mut wtx,
                    &mut rejected_by_reason,
                    Some(segment_id),
                    Some(bin_id),
                    RejectReason::Outlier,
                    Some(seg.duration_sec),
                    &bucket_id,
                    now,
                )
                .await?;
            }
        }
    }

    let rejected_segments = rejected_by_reason.total();
    let total_segments = req.segments.len() as u32;
    let all_stale = total_segments > 0
        && accepted_segments == 0
        && rejected_by_reason.stale_timestamp == rejected_segments;

    let response = RideSummaryResponse {
        accepted_segments,
        rejected_segments,
        rejected_by_reason,
    };

    if all_stale {
        let body = serde_json::json!({ "error": "unprocessable" });
        IdempotencyRepository::commit(wtx.as_mut(), idem_key, 422, &body).await?;
        wtx.commit().await?;
        return Err(DomainError::Unprocessable(
            "every segment fell outside the accepted timestamp window".to_string(),
        ));
    }

    let response_json = serde_json::to_value(&response).expect("RideSummaryResponse always serializes");
    IdempotencyRepository::commit(wtx.as_mut(), idem_key, 200, &response_json).await?;
    wtx.commit().await?;

    Ok(IngestResult::Success {
        response,
        quota: Some(decision),
    })
}

/// Checks the gates that do not need a registry lookup: the timestamp
/// window and map-match confidence floor.
fn pre_lookup_reject_reason(
    seg: &SegmentObservation,
    now: DateTime<Utc>,
    mapmatch_min_conf: f64,
) -> Option<RejectReason> {
    let window_start = now - Duration::days(7);
    if seg.observed_at < window_start || seg.observed_at > now {
        return Some(RejectReason::StaleTimestamp);
    }

    if let Some(conf) = seg.mapmatch_conf {
        if conf < mapmatch_min_conf {
            return Some(RejectReason::LowConfidence);
        }
    }

    None
}

async fn reject(
    wtx: &mut WriteTx<'_>,
    tally: &mut RejectedByReason,
    segment_id: Option<i64>,
    bin_id: Option<u16>,
    reason: RejectReason,
    observed_value: Option<f64>,
    bucket_id: &str,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    tally.increment(reason);
    let entry = RejectionEntry {
        segment_id,
        bin_id,
        reason,
        observed_value,
        bucket_id: bucket_id.to_string(),
        timestamp: now,
    };
    RejectionRepository::insert(wtx.as_mut(), &entry, now).await?;
    Ok(())
}
