use super::gateway::GatewayReport;
use super::lorawan::{DevEui, FCnt, FPort};

/// Network server flavor an uplink arrived from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkServer {
    TheThingsStackV3,
    ChirpStackV3,
    ChirpStackV4,
    Raw,
}

impl NetworkServer {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkServer::TheThingsStackV3 => "tts3",
            NetworkServer::ChirpStackV3 => "cs3",
            NetworkServer::ChirpStackV4 => "cs4",
            NetworkServer::Raw => "raw",
        }
    }
}

/// Field tester uplink extracted from a network server envelope
#[derive(Debug, Clone)]
pub struct UplinkRequest {
    pub network: NetworkServer,
    pub topic: String,
    pub dev_eui: Option<DevEui>,
    pub f_port: FPort,
    pub f_cnt: FCnt,
    pub payload: Vec<u8>,
    pub gateways: Vec<GatewayReport>,
}

/// Message to publish back to the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}
