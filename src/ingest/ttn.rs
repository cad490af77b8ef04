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

pub const TTN_DEFAULT_TOPIC: &str = "v3/+/devices/+/up";

pub struct TtnParser;

impl TtnParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TtnParser {
    fn default() -> Self {
        Self::new()
    }
}

/// TTN v3 uplink message format
#[derive(Debug, Deserialize)]
struct TtnUplink {
    #[serde(default)]
    end_device_ids: Option<TtnDeviceIds>,
    #[serde(default)]
    uplink_message: Option<TtnUplinkMessage>,
}

#[derive(Debug, Deserialize)]
struct TtnDeviceIds {
    #[serde(default)]
    dev_eui: Option<String>,
}

// The Things Stack omits zero-valued fields, so f_port and f_cnt may be
// missing from the JSON.
#[derive(Debug, Deserialize)]
struct TtnUplinkMessage {
    #[serde(default)]
    f_port: u32,
    #[serde(default)]
    f_cnt: u64,
    #[serde(default)]
    frm_payload: Option<String>,
    #[serde(default)]
    rx_metadata: Vec<TtnRxMetadata>,
}

#[derive(Debug, Deserialize)]
struct TtnRxMetadata {
    #[serde(default)]
    rssi: Option<i32>,
    #[serde(default)]
    channel_rssi: Option<i32>,
    #[serde(default)]
    location: Option<TtnLocation>,
}

#[derive(Debug, Deserialize)]
struct TtnLocation {
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
}

/// Body published to `.../down/replace`
#[derive(Debug, Serialize)]
struct TtnDownlinkQueue {
    downlinks: Vec<TtnDownlink>,
}

#[derive(Debug, Serialize)]
struct TtnDownlink {
    f_port: u32,
    frm_payload: String,
    priority: &'static str,
}

impl MessageParser for TtnParser {
    fn parse_message(&self, topic: &str, payload: &[u8]) -> Result<Option<UplinkRequest>> {
        // TTN topic format: v3/{app_id}/devices/{device_id}/up
        if !topic.ends_with("/up") {
            return Ok(None);
        }

        validate_payload_size(payload, MAX_MQTT_PAYLOAD_SIZE)?;

        let msg: TtnUplink = serde_json::from_slice(payload)
            .context("Failed to parse TTN uplink JSON")?;

        let Some(uplink) = msg.uplink_message else {
            return Ok(None);
        };

        // Skips our own downlink port and anything else that is not a fix
        if !is_field_tester_port(uplink.f_port) {
            return Ok(None);
        }

        let frm_payload = uplink
            .frm_payload
            .context("TTN uplink has no frm_payload")?;

        let dev_eui = msg
            .end_device_ids
            .and_then(|ids| ids.dev_eui)
            .and_then(|eui| DevEui::new(eui).ok());

        Ok(Some(UplinkRequest {
            network: NetworkServer::TheThingsStackV3,
            topic: topic.to_string(),
            dev_eui,
            f_port: uplink.f_port,
            f_cnt: uplink.f_cnt,
            payload: decode_base64(&frm_payload)?,
            gateways: uplink
                .rx_metadata
                .into_iter()
                .map(|rx| GatewayReport {
                    rssi: rx.rssi.or(rx.channel_rssi),
                    location: rx.location.and_then(|loc| match (loc.latitude, loc.longitude) {
                        (Some(lat), Some(lng)) => Some(GatewayLocation::new(lat, lng)),
                        _ => None,
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
        let base = request
            .topic
            .strip_suffix("/up")
            .context("TTN uplink topic does not end with /up")?;

        let body = TtnDownlinkQueue {
            downlinks: vec![TtnDownlink {
                f_port: report.downlink.f_port,
                frm_payload: report.downlink.payload.to_base64(),
                priority: "HIGH",
            }],
        };

        Ok(OutboundMessage {
            topic: format!("{}/down/replace", base),
            payload: serde_json::to_vec(&body)?,
        })
    }

    fn default_topic(&self) -> &'static str {
        TTN_DEFAULT_TOPIC
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::evaluate;
    use serde_json::{json, Value};

    const TOPIC: &str = "v3/field-test@ttn/devices/ftd-01/up";

    fn uplink_json(f_port: u32) -> String {
        json!({
            "end_device_ids": {
                "device_id": "ftd-01",
                "dev_eui": "0123456789ABCDEF",
                "application_ids": {
                    "application_id": "field-test"
                }
            },
            "uplink_message": {
                "f_port": f_port,
                "f_cnt": 300,
                "frm_payload": "AAECAwQFA+gPCA==",
                "rx_metadata": [{
                    "gateway_ids": {
                        "gateway_id": "eui-1234567890abcdef"
                    },
                    "rssi": -97,
                    "channel_rssi": -97,
                    "snr": 9.5,
                    "location": {
                        "latitude": 41.38,
                        "longitude": 2.17,
                        "altitude": 12,
                        "source": "SOURCE_REGISTRY"
                    }
                }, {
                    "gateway_ids": {
                        "gateway_id": "eui-fedcba0987654321"
                    },
                    "channel_rssi": -112,
                    "snr": -3.0
                }],
                "settings": {
                    "data_rate": {
                        "lora": {
                            "bandwidth": 125000,
                            "spreading_factor": 7
                        }
                    },
                    "frequency": "868100000"
                },
                "received_at": "2025-01-15T12:00:00.000Z"
            }
        })
        .to_string()
    }

    #[test]
    fn test_ttn_parser() {
        let parser = TtnParser::new();
        let request = parser
            .parse_message(TOPIC, uplink_json(1).as_bytes())
            .unwrap()
            .unwrap();

        assert_eq!(request.network, NetworkServer::TheThingsStackV3);
        assert_eq!(request.f_port, 1);
        assert_eq!(request.f_cnt, 300);
        assert_eq!(
            request.payload,
            vec![0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x03, 0xE8, 0x0F, 0x08]
        );
        assert_eq!(request.dev_eui.as_ref().map(|e| e.as_str()), Some("0123456789ABCDEF"));
        assert_eq!(request.gateways.len(), 2);
        assert_eq!(request.gateways[0].rssi, Some(-97));
        assert_eq!(
            request.gateways[0].location,
            Some(GatewayLocation::new(41.38, 2.17))
        );
        assert_eq!(request.gateways[1].rssi, Some(-112));
        assert_eq!(request.gateways[1].location, None);
    }

    #[test]
    fn test_ttn_filters_other_messages() {
        let parser = TtnParser::new();

        // Downlink acknowledgements on port 2
        assert!(parser
            .parse_message(TOPIC, uplink_json(2).as_bytes())
            .unwrap()
            .is_none());

        // Non-uplink topics
        assert!(parser
            .parse_message("v3/app/devices/dev/join", b"{}")
            .unwrap()
            .is_none());

        // Uplink topic without an uplink message
        assert!(parser.parse_message(TOPIC, b"{}").unwrap().is_none());

        assert!(parser.parse_message(TOPIC, b"not json").is_err());
    }

    #[test]
    fn test_ttn_missing_zero_fields() {
        let parser = TtnParser::new();
        let payload = json!({
            "uplink_message": {
                "f_port": 11,
                "frm_payload": "AAECAwQFA+gPCA=="
            }
        })
        .to_string();

        let request = parser
            .parse_message(TOPIC, payload.as_bytes())
            .unwrap()
            .unwrap();
        assert_eq!(request.f_cnt, 0);
        assert!(request.gateways.is_empty());
        assert!(request.dev_eui.is_none());
    }

    #[test]
    fn test_ttn_render_downlink() {
        let parser = TtnParser::new();
        let request = parser
            .parse_message(TOPIC, uplink_json(1).as_bytes())
            .unwrap()
            .unwrap();
        let report = evaluate(
            &request.payload,
            request.f_port,
            request.f_cnt,
            &request.gateways,
        )
        .unwrap();

        let message = parser.render_downlink(&request, &report).unwrap();
        assert_eq!(message.topic, "v3/field-test@ttn/devices/ftd-01/down/replace");

        let body: Value = serde_json::from_slice(&message.payload).unwrap();
        let downlink = &body["downlinks"][0];
        assert_eq!(downlink["f_port"], 2);
        assert_eq!(downlink["priority"], "HIGH");
        // seq 300 % 256, rssi -112 and -97, good fix, 2 gateways
        let bytes = decode_base64(downlink["frm_payload"].as_str().unwrap()).unwrap();
        assert_eq!(bytes, vec![44, 88, 103, 0, 0, 2]);
    }
}
