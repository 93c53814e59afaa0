//! Segment identity: an ordered pair of adjacent scheduled stops on a route
//! in a given direction.

use serde::{Deserialize, Serialize};

/// The natural key of a learnable segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentKey {
    pub route_id: String,
    pub direction_id: u8,
    pub from_stop_id: String,
    pub to_stop_id: String,
}

/// A registered segment, as seeded by the (out-of-scope) schedule importer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub segment_id: i64,
    pub route_id: String,
    pub direction_id: u8,
    pub from_stop_id: String,
    pub to_stop_id: String,
}
