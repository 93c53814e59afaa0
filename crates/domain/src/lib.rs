//! Domain types for the transit ETA learning service: the pure math
//! (bin mapping, online learning, estimation) and the request/response
//! shapes that sit above the storage layer.

pub mod binning;
pub mod errors;
pub mod estimator;
pub mod idempotency;
pub mod ingest;
pub mod learning;
pub mod query;
pub mod quota;
pub mod segment;
pub mod stats;

pub use binning::{bin_of, BIN_COUNT, DayType, SLOTS_PER_DAY};
pub use errors::*;
pub use estimator::{estimate, EstimatorConfig, EtaEstimate};
pub use idempotency::{canonicalize, hash_body, BodyHash, IdemOutcome};
pub use ingest::*;
pub use learning::{apply_observation, LearningConfig, Observation, OutlierRejected};
pub use query::*;
pub use quota::{apply_refill_and_debit, resolve_bucket_id, QuotaConfig, QuotaDecision};
pub use segment::{Segment, SegmentKey};
pub use stats::{Confidence, SegmentStat};
