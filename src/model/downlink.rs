use base64::Engine;
use serde::{Deserialize, Serialize};

/// Encoded downlink payload, 6 bytes for port 1 and 8 bytes for port 11
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownlinkBuffer(pub Vec<u8>);

impl DownlinkBuffer {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.0)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

/// Downlink ready to be wrapped by a network server envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Downlink {
    /// Uplink port + 1
    pub f_port: u32,
    pub payload: DownlinkBuffer,
}
