//! Field tester uplink decoding.
//!
//! ```text
//! byte 0      : lon_sign (1) || lat_sign (1) || enc_lat[22..17] (6)
//! byte 1..2   : enc_lat[16..1]
//! byte 3      : enc_lat[0] (1) || enc_lon[22..16] (7)
//! byte 4..5   : enc_lon[15..0]
//! byte 6..7   : altitude + 1000, big-endian
//! byte 8      : hdop * 10
//! byte 9      : satellites
//! ```

use crate::error::{FieldTesterError, Result};
use crate::model::fix::DecodedFix;

pub const UPLINK_LEN: usize = 10;

const ALTITUDE_OFFSET_M: i32 = 1000;

// Quantization step and midpoint offset of the wire format, in 1e-7 degrees.
const LAT_STEP: f64 = 108.0;
const LAT_MIDPOINT: f64 = 53.0;
const LON_STEP: f64 = 215.0;
const LON_MIDPOINT: f64 = 107.0;
const COORD_SCALE: f64 = 10_000_000.0;

/// Decode a 10-byte uplink into a GPS fix.
///
/// Every 10-byte input decodes; any other length is rejected.
pub fn decode_uplink(bytes: &[u8]) -> Result<DecodedFix> {
    let b: &[u8; UPLINK_LEN] = bytes.try_into().map_err(|_| {
        FieldTesterError::MalformedPayload(format!(
            "expected {} bytes, got {}",
            UPLINK_LEN,
            bytes.len()
        ))
    })?;

    let lon_sign = if b[0] & 0x80 != 0 { -1.0 } else { 1.0 };
    let lat_sign = if b[0] & 0x40 != 0 { -1.0 } else { 1.0 };

    let enc_lat = ((b[0] as u32 & 0x3F) << 17)
        | ((b[1] as u32) << 9)
        | ((b[2] as u32) << 1)
        | (b[3] as u32 >> 7);
    let enc_lon = ((b[3] as u32 & 0x7F) << 16) | ((b[4] as u32) << 8) | b[5] as u32;

    let altitude_m = u16::from_be_bytes([b[6], b[7]]) as i32 - ALTITUDE_OFFSET_M;

    Ok(DecodedFix {
        latitude: lat_sign * (enc_lat as f64 * LAT_STEP + LAT_MIDPOINT) / COORD_SCALE,
        longitude: lon_sign * (enc_lon as f64 * LON_STEP + LON_MIDPOINT) / COORD_SCALE,
        altitude_m,
        hdop: b[8] as f64 / 10.0,
        satellites: b[9],
    })
}
