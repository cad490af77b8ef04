use serde::{Deserialize, Serialize};

/// GPS fix carried by a field tester uplink
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecodedFix {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: i32,
    pub hdop: f64,
    pub satellites: u8,
}

impl DecodedFix {
    /// Estimated horizontal accuracy in meters
    pub fn accuracy_m(&self) -> f64 {
        (self.hdop * 5.0 + 5.0) / 10.0
    }

    /// Latitude within [-90, 90] and longitude within [-180, 180]
    pub fn has_valid_geometry(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}
