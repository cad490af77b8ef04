use super::common::{validate_payload_size, MessageParser, MAX_MQTT_PAYLOAD_SIZE};
use crate::model::frames::{NetworkServer, OutboundMessage, UplinkRequest};
use crate::model::gateway::GatewayReport;
use crate::model::lorawan::{FCnt, FPort};
use crate::model::report::FieldTestReport;
use anyhow::{Context, Result};
use serde::Deserialize;

pub const RAW_DEFAULT_TOPIC: &str = "fieldtester/+/up";

/// Bare envelope for bench testing without a network server:
/// the device bytes, the uplink counter and the gateway list as plain JSON.
pub struct RawParser;

impl RawParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RawParser {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct RawUplink {
    #[serde(default)]
    bytes: Vec<u8>,
    #[serde(default)]
    uplink_counter: FCnt,
    #[serde(default = "default_port")]
    port: FPort,
    #[serde(default)]
    gateways: Vec<GatewayReport>,
}

fn default_port() -> FPort {
    1
}

impl MessageParser for RawParser {
    fn parse_message(&self, topic: &str, payload: &[u8]) -> Result<Option<UplinkRequest>> {
        if !topic.ends_with("/up") {
            return Ok(None);
        }

        validate_payload_size(payload, MAX_MQTT_PAYLOAD_SIZE)?;

        let msg: RawUplink =
            serde_json::from_slice(payload).context("Failed to parse raw uplink JSON")?;

        // Unlike the network server envelopes, an unknown port is not
        // filtered here; it surfaces as UnsupportedPort in the log.
        Ok(Some(UplinkRequest {
            network: NetworkServer::Raw,
            topic: topic.to_string(),
            dev_eui: None,
            f_port: msg.port,
            f_cnt: msg.uplink_counter,
            payload: msg.bytes,
            gateways: msg.gateways,
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
            .context("Raw uplink topic does not end with /up")?;

        Ok(OutboundMessage {
            topic: format!("{}/result", base),
            payload: serde_json::to_vec(report)?,
        })
    }

    fn default_topic(&self) -> &'static str {
        RAW_DEFAULT_TOPIC
    }
}
