use super::downlink::Downlink;
use super::fix::DecodedFix;
use serde::{Deserialize, Serialize};

/// Gateway statistics folded over one uplink's reception metadata.
///
/// The distance fields keep their sentinel values unless the fix is
/// degraded and at least one gateway reported a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub degraded: bool,
    pub gateway_count: usize,
    pub min_rssi: i32,
    pub max_rssi: i32,
    pub min_distance_m: u32,
    pub max_distance_m: u32,
}

/// Everything derived from one uplink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldTestReport {
    pub fix: DecodedFix,
    pub accuracy_m: f64,
    pub stats: AggregateStats,
    pub downlink: Downlink,
}
