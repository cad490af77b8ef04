use crate::codec::DownlinkFormat;
use crate::error::FieldTesterError;
use crate::model::frames::{OutboundMessage, UplinkRequest};
use crate::model::report::FieldTestReport;
use anyhow::Result;
use base64::Engine;

/// Trait for the network server envelopes the field tester service speaks
pub trait MessageParser: Send + Sync {
    /// Parse an MQTT message into an uplink request.
    ///
    /// Returns `Ok(None)` for messages that are not field tester uplinks,
    /// including our own downlinks echoed back by the broker.
    fn parse_message(&self, topic: &str, payload: &[u8]) -> Result<Option<UplinkRequest>>;

    /// Wrap a processed uplink into the downlink message to publish
    fn render_downlink(
        &self,
        request: &UplinkRequest,
        report: &FieldTestReport,
    ) -> Result<OutboundMessage>;

    /// Default subscription filter for this envelope
    fn default_topic(&self) -> &'static str;
}

/// Validate payload size to prevent DoS attacks
pub fn validate_payload_size(payload: &[u8], max_size: usize) -> Result<()> {
    if payload.len() > max_size {
        return Err(FieldTesterError::MqttParseError(format!(
            "Payload too large: {} bytes (max: {})",
            payload.len(),
            max_size
        ))
        .into());
    }
    Ok(())
}

/// Only ports 1 and 11 carry field tester uplinks; everything else is
/// filtered before decoding.
pub fn is_field_tester_port(f_port: u32) -> bool {
    DownlinkFormat::from_port(f_port).is_ok()
}

pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|e| FieldTesterError::from(e).into())
}

pub const MAX_MQTT_PAYLOAD_SIZE: usize = 1024 * 1024; // 1MB

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_payload_size() {
        assert!(validate_payload_size(&[0u8; 16], 16).is_ok());
        assert!(validate_payload_size(&[0u8; 17], 16).is_err());
    }

    #[test]
    fn test_field_tester_ports() {
        assert!(is_field_tester_port(1));
        assert!(is_field_tester_port(11));
        assert!(!is_field_tester_port(2));
        assert!(!is_field_tester_port(12));
        assert!(!is_field_tester_port(0));
    }

    #[test]
    fn test_decode_base64() {
        assert_eq!(decode_base64("AQIDBA==").unwrap(), vec![1, 2, 3, 4]);
        assert!(decode_base64("not base64!").is_err());
    }
}
