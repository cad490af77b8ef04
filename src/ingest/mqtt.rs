use crate::codec::evaluate;
use crate::config::MqttConfig;
use crate::error::FieldTesterError;
use crate::ingest::common::MessageParser;
use crate::model::frames::OutboundMessage;
use anyhow::{Context, Result};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS, Transport};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const MAX_MQTT_PACKET_SIZE: usize = 256 * 1024; // 256KB
pub const MQTT_KEEP_ALIVE: u64 = 30; // 30 seconds
const PAYLOAD_PREVIEW_LEN: usize = 500;

/// Broker address extracted from an `mqtt://`, `mqtts://` or `ssl://` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
}

pub fn parse_broker_url(broker_url: &str) -> Result<BrokerAddress> {
    let (use_tls, rest) = if let Some(rest) = broker_url.strip_prefix("mqtts://") {
        (true, rest)
    } else if let Some(rest) = broker_url.strip_prefix("ssl://") {
        (true, rest)
    } else if let Some(rest) = broker_url.strip_prefix("mqtt://") {
        (false, rest)
    } else if let Some(rest) = broker_url.strip_prefix("tcp://") {
        (false, rest)
    } else if broker_url.contains("://") {
        return Err(FieldTesterError::ConfigError(format!(
            "Unsupported broker URL scheme: {}",
            broker_url
        ))
        .into());
    } else {
        (false, broker_url)
    };

    let rest = rest.trim_end_matches('/');
    let (host, port) = if let Some((h, p)) = rest.split_once(':') {
        (h.to_string(), p.parse::<u16>().context("Invalid broker port")?)
    } else {
        (rest.to_string(), if use_tls { 8883 } else { 1883 })
    };

    if host.is_empty() {
        return Err(FieldTesterError::ConfigError("Broker host is empty".to_string()).into());
    }

    Ok(BrokerAddress {
        host,
        port,
        use_tls,
    })
}

/// Run one inbound publish through parse, evaluate and render.
///
/// `Ok(None)` means the message was not a field tester uplink.
pub fn handle_message(
    parser: &dyn MessageParser,
    topic: &str,
    payload: &[u8],
) -> Result<Option<OutboundMessage>> {
    let Some(request) = parser.parse_message(topic, payload)? else {
        return Ok(None);
    };

    debug!(
        network = request.network.as_str(),
        f_port = request.f_port,
        f_cnt = request.f_cnt,
        gateways = request.gateways.len(),
        "Received uplink: 0x{}",
        hex::encode(&request.payload)
    );

    let report = evaluate(
        &request.payload,
        request.f_port,
        request.f_cnt,
        &request.gateways,
    )?;

    debug!(
        "Processed: {}",
        serde_json::to_string(&report).unwrap_or_default()
    );

    parser.render_downlink(&request, &report).map(Some)
}

/// Field tester service: subscribes to uplinks and publishes the
/// answering downlinks on the same broker
pub struct FieldTesterService {
    mqtt_config: MqttConfig,
    topic: String,
    parser: Arc<dyn MessageParser + Send + Sync>,
}

impl FieldTesterService {
    pub fn new(
        mqtt_config: MqttConfig,
        topic: String,
        parser: Arc<dyn MessageParser + Send + Sync>,
    ) -> Self {
        Self {
            mqtt_config,
            topic,
            parser,
        }
    }

    /// Connect and process messages, reconnecting forever
    pub async fn start(self) -> Result<()> {
        let reconnect_delay = Duration::from_secs(self.mqtt_config.reconnect_interval_secs);

        loop {
            match self.connect_and_run().await {
                Ok(_) => {
                    info!("MQTT client disconnected gracefully");
                }
                Err(e) => {
                    error!("MQTT client error: {:#}", e);
                }
            }

            warn!("MQTT client disconnected, reconnecting in {:?}", reconnect_delay);
            tokio::time::sleep(reconnect_delay).await;
        }
    }

    fn mqtt_options(&self) -> Result<MqttOptions> {
        let broker = parse_broker_url(&self.mqtt_config.broker_url)?;

        info!(
            "Connecting to MQTT broker at {}:{} (TLS: {})",
            broker.host, broker.port, broker.use_tls
        );

        let mut mqttoptions =
            MqttOptions::new(&self.mqtt_config.client_id, broker.host, broker.port);

        mqttoptions.set_keep_alive(Duration::from_secs(MQTT_KEEP_ALIVE));
        mqttoptions.set_max_packet_size(MAX_MQTT_PACKET_SIZE, MAX_MQTT_PACKET_SIZE);

        if let Some(username) = &self.mqtt_config.username {
            let password = self.mqtt_config.password.clone().unwrap_or_default();
            mqttoptions.set_credentials(username, password);
        }

        if broker.use_tls {
            // Use rustls transport (will load system certificates automatically)
            mqttoptions.set_transport(Transport::tls_with_default_config());
            info!("MQTT: TLS configured with system certificates");
        }

        Ok(mqttoptions)
    }

    /// Connect to MQTT broker and process messages
    async fn connect_and_run(&self) -> Result<()> {
        let (client, mut eventloop) = AsyncClient::new(self.mqtt_options()?, 100);

        client
            .subscribe(&self.topic, QoS::AtLeastOnce)
            .await
            .context("Failed to subscribe to topic")?;

        info!("MQTT: Subscribing to topic: {}", self.topic);

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(publish))) => {
                    debug!("MQTT: Received message on topic: {}", publish.topic);

                    match handle_message(self.parser.as_ref(), &publish.topic, &publish.payload) {
                        Ok(Some(message)) => {
                            if let Err(e) = publish_outbound(&client, &message) {
                                error!("MQTT: Failed to publish downlink: {:#}", e);
                            }
                        }
                        Ok(None) => {
                            debug!("MQTT: Message filtered on topic '{}'", publish.topic);
                        }
                        Err(e) => {
                            let payload_preview = String::from_utf8_lossy(&publish.payload);
                            let preview: String =
                                payload_preview.chars().take(PAYLOAD_PREVIEW_LEN).collect();
                            let kind = match e.downcast_ref::<FieldTesterError>() {
                                Some(err) if err.is_per_message() => "Dropped uplink",
                                _ => "Failed to handle message",
                            };
                            warn!(
                                "MQTT: {} on topic '{}': {:#} | Payload: {}",
                                kind, publish.topic, e, preview
                            );
                        }
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("MQTT: Connected successfully");
                }
                Ok(Event::Incoming(Incoming::SubAck(_))) => {
                    info!("MQTT: Subscription acknowledged");
                }
                Ok(Event::Incoming(Incoming::Disconnect)) => {
                    warn!("MQTT: Disconnected by broker");
                    return Err(
                        FieldTesterError::MqttError("Disconnected by broker".into()).into()
                    );
                }
                Ok(_) => {
                    // Other events (PingResp, PubAck, etc.)
                }
                Err(e) => {
                    error!("MQTT: Connection error: {}", e);
                    return Err(e.into());
                }
            }
        }
    }
}

/// Queue a downlink without awaiting, so the event loop that drains the
/// request queue is never blocked by its own publishes.
pub fn publish_outbound(client: &AsyncClient, message: &OutboundMessage) -> Result<()> {
    client
        .try_publish(
            message.topic.clone(),
            QoS::AtLeastOnce,
            false,
            message.payload.clone(),
        )
        .map_err(|e| FieldTesterError::MqttError(e.to_string()))?;

    info!(
        "MQTT: Published {} byte downlink to '{}'",
        message.payload.len(),
        message.topic
    );
    Ok(())
}
