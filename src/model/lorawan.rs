use crate::error::FieldTesterError;
use serde::{Deserialize, Serialize};

/// LoRaWAN DevEUI (8 bytes, hex-encoded in JSON)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DevEui(pub String);

impl DevEui {
    pub fn new(dev_eui: String) -> Result<Self, FieldTesterError> {
        let eui = Self(dev_eui);
        eui.validate()?;
        Ok(eui)
    }

    pub fn validate(&self) -> Result<(), FieldTesterError> {
        if self.0.len() != 16 {
            return Err(FieldTesterError::MqttParseError(
                "DevEUI must be 16 hex characters".to_string(),
            ));
        }
        if !self.0.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(FieldTesterError::MqttParseError(
                "DevEUI must contain only hex characters".to_string(),
            ));
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DevEui {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Application port of an uplink or downlink
pub type FPort = u32;

/// Uplink frame counter, used as the downlink sequence id
pub type FCnt = u64;

/// RSSI in dBm
pub type Rssi = i32;
