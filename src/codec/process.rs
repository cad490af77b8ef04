//! Quality gate, cross-gateway aggregation and downlink encoding.
//!
//! ## Compact downlink (uplink port 1, 6 bytes)
//!
//! ```text
//! seq (1) || min_rssi + 200 (1) || max_rssi + 200 (1)
//! || min_distance / 250m (1) || max_distance / 250m (1) || gateways (1)
//! ```
//!
//! ## Extended downlink (uplink port 11, 8 bytes)
//!
//! ```text
//! seq (1) || min_rssi + 200 (1) || max_rssi + 200 (1)
//! || min_distance / 10m (2, BE) || max_distance / 10m (2, BE) || gateways (1)
//! ```
//!
//! Distance fields are zero unless the fix is degraded.

use super::geo::circle_distance;
use super::uplink::decode_uplink;
use crate::error::{FieldTesterError, Result};
use crate::model::downlink::{Downlink, DownlinkBuffer};
use crate::model::fix::DecodedFix;
use crate::model::gateway::GatewayReport;
use crate::model::lorawan::{FCnt, FPort};
use crate::model::report::{AggregateStats, FieldTestReport};

/// Start of the min RSSI fold, also used for gateways without RSSI
pub const MIN_RSSI_SENTINEL: i32 = 200;
/// Start of the max RSSI fold, also used for gateways without RSSI
pub const MAX_RSSI_SENTINEL: i32 = -200;
pub const MIN_DISTANCE_SENTINEL: u32 = 1_000_000;
pub const MAX_DISTANCE_SENTINEL: u32 = 0;

const RSSI_OFFSET: i32 = 200;

const MAX_GOOD_HDOP: f64 = 2.0;
const MIN_GOOD_SATELLITES: u8 = 5;

const COMPACT_STEP_M: f64 = 250.0;
const COMPACT_MAX_BUCKET: u32 = 128;
const EXTENDED_STEP_M: f64 = 10.0;
const EXTENDED_MAX_VALUE: u32 = u16::MAX as u32;

/// Downlink layout, selected by the uplink port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownlinkFormat {
    /// Port 1, distances in 250 m buckets
    Compact,
    /// Port 11, distances in 10 m steps over 16 bits
    Extended,
}

impl DownlinkFormat {
    pub fn from_port(port: FPort) -> Result<Self> {
        match port {
            1 => Ok(DownlinkFormat::Compact),
            11 => Ok(DownlinkFormat::Extended),
            other => Err(FieldTesterError::UnsupportedPort(other)),
        }
    }

    pub fn uplink_port(&self) -> FPort {
        match self {
            DownlinkFormat::Compact => 1,
            DownlinkFormat::Extended => 11,
        }
    }

    /// Downlinks answer on the port following the uplink's
    pub fn downlink_port(&self) -> FPort {
        self.uplink_port() + 1
    }

    pub fn buffer_len(&self) -> usize {
        match self {
            DownlinkFormat::Compact => 6,
            DownlinkFormat::Extended => 8,
        }
    }

    pub fn encode(&self, stats: &AggregateStats, sequence_id: FCnt) -> DownlinkBuffer {
        let mut buf = Vec::with_capacity(self.buffer_len());
        buf.push((sequence_id % 256) as u8);
        buf.push(rssi_byte(stats.min_rssi));
        buf.push(rssi_byte(stats.max_rssi));

        match self {
            DownlinkFormat::Compact => {
                if stats.degraded {
                    buf.push(compact_bucket(stats.min_distance_m));
                    buf.push(compact_bucket(stats.max_distance_m));
                } else {
                    buf.extend_from_slice(&[0, 0]);
                }
            }
            DownlinkFormat::Extended => {
                if stats.degraded {
                    buf.extend_from_slice(&extended_steps(stats.min_distance_m).to_be_bytes());
                    buf.extend_from_slice(&extended_steps(stats.max_distance_m).to_be_bytes());
                } else {
                    buf.extend_from_slice(&[0, 0, 0, 0]);
                }
            }
        }

        buf.push((stats.gateway_count % 256) as u8);
        DownlinkBuffer(buf)
    }
}

fn rssi_byte(rssi: i32) -> u8 {
    rssi.wrapping_add(RSSI_OFFSET).rem_euclid(256) as u8
}

fn compact_bucket(distance_m: u32) -> u8 {
    let bucket = (distance_m as f64 / COMPACT_STEP_M).round() as u32;
    bucket.clamp(1, COMPACT_MAX_BUCKET) as u8
}

fn extended_steps(distance_m: u32) -> u16 {
    let steps = (distance_m as f64 / EXTENDED_STEP_M).round() as u32;
    steps.clamp(1, EXTENDED_MAX_VALUE) as u16
}

/// A fix is degraded when its HDOP is above 2 or fewer than 5 satellites
/// were used.
pub fn is_degraded(fix: &DecodedFix) -> bool {
    fix.hdop > MAX_GOOD_HDOP || fix.satellites < MIN_GOOD_SATELLITES
}

/// Fold RSSI extrema over all gateways and, for degraded fixes only,
/// distance extrema over the gateways that report a location.
///
/// Gateway locations outside the valid coordinate range are left out of the
/// distance fold but still counted.
pub fn aggregate(fix: &DecodedFix, gateways: &[GatewayReport]) -> AggregateStats {
    let degraded = is_degraded(fix);

    let mut stats = AggregateStats {
        degraded,
        gateway_count: gateways.len(),
        min_rssi: MIN_RSSI_SENTINEL,
        max_rssi: MAX_RSSI_SENTINEL,
        min_distance_m: MIN_DISTANCE_SENTINEL,
        max_distance_m: MAX_DISTANCE_SENTINEL,
    };

    for gateway in gateways {
        stats.min_rssi = stats.min_rssi.min(gateway.rssi.unwrap_or(MIN_RSSI_SENTINEL));
        stats.max_rssi = stats.max_rssi.max(gateway.rssi.unwrap_or(MAX_RSSI_SENTINEL));

        if !degraded {
            continue;
        }

        if let Some(location) = gateway.location.filter(|loc| loc.is_valid()) {
            let distance = circle_distance(
                fix.latitude,
                fix.longitude,
                location.latitude,
                location.longitude,
            )
            .round() as u32;
            stats.min_distance_m = stats.min_distance_m.min(distance);
            stats.max_distance_m = stats.max_distance_m.max(distance);
        }
    }

    stats
}

fn check_geometry(fix: &DecodedFix) -> Result<()> {
    if !fix.has_valid_geometry() {
        return Err(FieldTesterError::InvalidGeometry {
            latitude: fix.latitude,
            longitude: fix.longitude,
        });
    }
    Ok(())
}

/// Build the downlink answering one field tester uplink
pub fn process(
    fix: &DecodedFix,
    port: FPort,
    sequence_id: FCnt,
    gateways: &[GatewayReport],
) -> Result<Downlink> {
    let format = DownlinkFormat::from_port(port)?;
    check_geometry(fix)?;

    let stats = aggregate(fix, gateways);

    Ok(Downlink {
        f_port: format.downlink_port(),
        payload: format.encode(&stats, sequence_id),
    })
}

/// Decode a raw uplink and process it, keeping the intermediate results
pub fn evaluate(
    bytes: &[u8],
    port: FPort,
    sequence_id: FCnt,
    gateways: &[GatewayReport],
) -> Result<FieldTestReport> {
    let format = DownlinkFormat::from_port(port)?;
    let fix = decode_uplink(bytes)?;
    check_geometry(&fix)?;

    let stats = aggregate(&fix, gateways);
    let downlink = Downlink {
        f_port: format.downlink_port(),
        payload: format.encode(&stats, sequence_id),
    };

    Ok(FieldTestReport {
        fix,
        accuracy_m: fix.accuracy_m(),
        stats,
        downlink,
    })
}
