use super::common::{
    decode_base64, is_field_tester_port, validate_payload_size, MessageParser,
    MAX_MQTT_PAYLOAD_SIZE,
};
use crate::model::frames::{NetworkServer, OutboundMessage, UplinkRequest};
use crate::model::gateway::{GatewayLocation, GatewayReport};
use crate::model::lorawan::DevEui;
use crate::model::report::FieldTestReport;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const CHIRPSTACK_DEFAULT_TOPIC: &str = "application/+/device/+/event/up";

pub struct ChirpStackParser;

impl ChirpStackParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ChirpStackParser {
    fn default() -> Self {
        Self::new()
    }
}

/// ChirpStack uplink event, v3 and v4 share the fields we need.
/// Only v4 carries `deviceInfo`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChirpStackUplink {
    #[serde(default)]
    device_info: Option<ChirpStackDeviceInfo>,
    #[serde(default)]
    f_port: Option<u32>,
    #[serde(default)]
    f_cnt: Option<u64>,
    #[serde(default)]
    rx_info: Vec<ChirpStackRxInfo>,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChirpStackDeviceInfo {
    dev_eui: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChirpStackRxInfo {
    #[serde(default)]
    rssi: Option<i32>,
    #[serde(default)]
    location: Option<ChirpStackLocation>,
}

#[derive(Debug, Deserialize)]
struct ChirpStackLocation {
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
}

/// Body published to `.../command/down`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChirpStackDownlink {
    confirmed: bool,
    f_port: u32,
    data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    dev_eui: Option<String>,
}

impl MessageParser for ChirpStackParser {
    fn parse_message(&self, topic: &str, payload: &[u8]) -> Result<Option<UplinkRequest>> {
        // ChirpStack topic format: application/{app_id}/device/{dev_eui}/event/up
        if !topic.contains("/event/up") {
            return Ok(None); // Not an uplink message
        }

        validate_payload_size(payload, MAX_MQTT_PAYLOAD_SIZE)?;

        let msg: ChirpStackUplink = serde_json::from_slice(payload)
            .map_err(|e| {
                tracing::error!("ChirpStack JSON parse error: {}", e);
                anyhow::anyhow!("Failed to parse ChirpStack uplink JSON: {}", e)
            })?;

        let (network, dev_eui) = match msg.device_info {
            Some(info) => (NetworkServer::ChirpStackV4, Some(DevEui::new(info.dev_eui)?)),
            None => (NetworkServer::ChirpStackV3, None),
        };
        tracing::debug!("ChirpStack {} uplink on topic '{}'", network.as_str(), topic);

        let f_port = msg.f_port.unwrap_or(0);
        if !is_field_tester_port(f_port) {
            return Ok(None);
        }

        let data = msg.data.context("ChirpStack uplink has no data")?;

        Ok(Some(UplinkRequest {
            network,
            topic: topic.to_string(),
            dev_eui,
            f_port,
            f_cnt: msg.f_cnt.unwrap_or(0),
            payload: decode_base64(&data)?,
            gateways: msg
                .rx_info
                .into_iter()
                .map(|rx| GatewayReport {
                    rssi: rx.rssi,
                    location: rx.location.and_then(|loc| {
                        // Only create location if we have lat/lng
                        match (loc.latitude, loc.longitude) {
                            (Some(lat), Some(lng)) => Some(GatewayLocation::new(lat, lng)),
                            _ => None,
                        }
                    }),
                })
                .collect(),
        }))
    }

    fn render_downlink(
        &self,
        request: &UplinkRequest,
        report: &FieldTestReport,
    ) -> Result<OutboundMessage> {
        let dev_eui = match request.network {
            NetworkServer::ChirpStackV4 => Some(
                request
                    .dev_eui
                    .as_ref()
                    .context("ChirpStack v4 downlink requires a DevEUI")?
                    .to_string(),
            ),
            _ => None,
        };

        let body = ChirpStackDownlink {
            confirmed: false,
            f_port: report.downlink.f_port,
            data: report.downlink.payload.to_base64(),
            dev_eui,
        };

        Ok(OutboundMessage {
            topic: request.topic.replace("/event/up", "/command/down"),
            payload: serde_json::to_vec(&body)?,
        })
    }

    fn default_topic(&self) -> &'static str {
        CHIRPSTACK_DEFAULT_TOPIC
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::evaluate;
    use serde_json::Value;

    const TOPIC: &str = "application/field-test/device/0123456789abcdef/event/up";

    const V4_PAYLOAD: &str = r#"{
        "deduplicationId": "3ac7e3c4-4401-4b8d-9386-a5c902f9202d",
        "time": "2025-11-26T06:14:58.501022+00:00",
        "deviceInfo": {
            "tenantId": "52f14cd4-c6f1-4fbd-8f87-4025e1d49242",
            "devEui": "0123456789abcdef",
            "deviceName": "ftd-01",
            "applicationId": "field-test",
            "applicationName": "field-test"
        },
        "fPort": 11,
        "fCnt": 42,
        "confirmed": false,
        "adr": true,
        "dr": 5,
        "rxInfo": [{
            "gatewayId": "0016c001ff10a235",
            "rssi": -50,
            "snr": 10.5,
            "channel": 0,
            "rfChain": 0,
            "location": {
                "latitude": 41.38,
                "longitude": 2.17
            }
        }, {
            "gatewayId": "0016c001ff10a236",
            "location": {}
        }],
        "txInfo": {
            "frequency": 868100000
        },
        "data": "AAECAwQFA+gPCA=="
    }"#;

    const V3_PAYLOAD: &str = r#"{
        "applicationID": "1",
        "applicationName": "field-test",
        "deviceName": "ftd-01",
        "devEUI": "ASNFZ4mrze8=",
        "rxInfo": [{
            "gatewayID": "ABbAAf8QojU=",
            "rssi": -71,
            "loRaSNR": 7.8
        }],
        "fCnt": 7,
        "fPort": 1,
        "data": "AAECAwQFA+gPCA=="
    }"#;

    #[test]
    fn test_chirpstack_v4_parser() {
        let parser = ChirpStackParser::new();
        let request = parser
            .parse_message(TOPIC, V4_PAYLOAD.as_bytes())
            .unwrap()
            .unwrap();

        assert_eq!(request.network, NetworkServer::ChirpStackV4);
        assert_eq!(request.dev_eui.as_ref().unwrap().as_str(), "0123456789abcdef");
        assert_eq!(request.f_port, 11);
        assert_eq!(request.f_cnt, 42);
        assert_eq!(request.payload.len(), 10);
        assert_eq!(request.gateways.len(), 2);
        assert_eq!(request.gateways[0].rssi, Some(-50));
        assert!(request.gateways[0].location.is_some());

        // Missing rssi and empty location are tolerated
        assert_eq!(request.gateways[1], GatewayReport::default());
    }

    #[test]
    fn test_chirpstack_v3_parser() {
        let parser = ChirpStackParser::new();
        let request = parser
            .parse_message(TOPIC, V3_PAYLOAD.as_bytes())
            .unwrap()
            .unwrap();

        assert_eq!(request.network, NetworkServer::ChirpStackV3);
        assert!(request.dev_eui.is_none());
        assert_eq!(request.f_port, 1);
        assert_eq!(request.f_cnt, 7);
        assert_eq!(request.gateways[0].rssi, Some(-71));
    }

    #[test]
    fn test_chirpstack_filters_other_messages() {
        let parser = ChirpStackParser::new();

        let join_topic = "application/field-test/device/0123456789abcdef/event/join";
        assert!(parser
            .parse_message(join_topic, V4_PAYLOAD.as_bytes())
            .unwrap()
            .is_none());

        let ack = V3_PAYLOAD.replace("\"fPort\": 1", "\"fPort\": 2");
        assert!(parser.parse_message(TOPIC, ack.as_bytes()).unwrap().is_none());

        let no_port = V3_PAYLOAD.replace("\"fPort\": 1,", "");
        assert!(parser.parse_message(TOPIC, no_port.as_bytes()).unwrap().is_none());

        assert!(parser.parse_message(TOPIC, b"{").is_err());
    }

    #[test]
    fn test_chirpstack_rejects_invalid_dev_eui() {
        let parser = ChirpStackParser::new();
        let payload = V4_PAYLOAD.replace("0123456789abcdef", "not-an-eui");
        assert!(parser.parse_message(TOPIC, payload.as_bytes()).is_err());
    }

    #[test]
    fn test_chirpstack_render_downlink() {
        let parser = ChirpStackParser::new();

        let request = parser
            .parse_message(TOPIC, V4_PAYLOAD.as_bytes())
            .unwrap()
            .unwrap();
        let report = evaluate(&request.payload, request.f_port, request.f_cnt, &request.gateways)
            .unwrap();
        let message = parser.render_downlink(&request, &report).unwrap();

        assert_eq!(
            message.topic,
            "application/field-test/device/0123456789abcdef/command/down"
        );
        let body: Value = serde_json::from_slice(&message.payload).unwrap();
        assert_eq!(body["confirmed"], false);
        assert_eq!(body["fPort"], 12);
        assert_eq!(body["devEui"], "0123456789abcdef");
        let bytes = decode_base64(body["data"].as_str().unwrap()).unwrap();
        assert_eq!(bytes, vec![42, 150, 150, 0, 0, 0, 0, 2]);

        let request = parser
            .parse_message(TOPIC, V3_PAYLOAD.as_bytes())
            .unwrap()
            .unwrap();
        let report = evaluate(&request.payload, request.f_port, request.f_cnt, &request.gateways)
            .unwrap();
        let message = parser.render_downlink(&request, &report).unwrap();

        let body: Value = serde_json::from_slice(&message.payload).unwrap();
        assert_eq!(body["fPort"], 2);
        assert!(body.get("devEui").is_none());
    }
}
