use super::lorawan::Rssi;
use serde::{Deserialize, Serialize};

/// Reception metadata of one gateway that heard the uplink.
///
/// Both fields are optional: network servers omit the RSSI for some
/// packet-forwarder setups and only report a location for gateways that
/// have one configured. A report with neither still counts as a gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayReport {
    #[serde(default)]
    pub rssi: Option<Rssi>,
    #[serde(default)]
    pub location: Option<GatewayLocation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GatewayLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl GatewayLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Latitude within [-90, 90] and longitude within [-180, 180]
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl GatewayReport {
    pub fn new(rssi: Option<Rssi>, location: Option<GatewayLocation>) -> Self {
        Self { rssi, location }
    }
}
