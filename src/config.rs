use crate::error::FieldTesterError;
use crate::ingest::chirpstack::ChirpStackParser;
use crate::ingest::common::MessageParser;
use crate::ingest::mqtt::parse_broker_url;
use crate::ingest::raw::RawParser;
use crate::ingest::ttn::TtnParser;
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub parser: ParserType,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker_url: String,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Subscription filter, defaults to the parser's uplink topic
    pub topic: Option<String>,
    pub reconnect_interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = FieldTesterError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(FieldTesterError::ConfigError(format!(
                "Unknown log format: {}",
                other
            ))),
        }
    }
}

/// Network server envelope to speak on the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserType {
    TheThingsStackV3,
    ChirpStack,
    Raw,
}

impl FromStr for ParserType {
    type Err = FieldTesterError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "TheThingsStack_v3" | "tts3" => Ok(ParserType::TheThingsStackV3),
            "ChirpStack_v3+" | "cs34" => Ok(ParserType::ChirpStack),
            "raw" => Ok(ParserType::Raw),
            other => Err(FieldTesterError::ConfigError(format!(
                "Unknown parser type: {}",
                other
            ))),
        }
    }
}

impl ParserType {
    pub fn build(&self) -> Arc<dyn MessageParser + Send + Sync> {
        match self {
            ParserType::TheThingsStackV3 => Arc::new(TtnParser::new()),
            ParserType::ChirpStack => Arc::new(ChirpStackParser::new()),
            ParserType::Raw => Arc::new(RawParser::new()),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let mqtt = MqttConfig {
            broker_url: env::var("FIELDTESTER_MQTT_BROKER")
                .unwrap_or_else(|_| "mqtt://localhost:1883".to_string()),
            client_id: env::var("FIELDTESTER_MQTT_CLIENT_ID").unwrap_or_else(|_| {
                format!("fieldtester-{}", uuid::Uuid::new_v4())
            }),
            username: env::var("FIELDTESTER_MQTT_USERNAME").ok(),
            password: env::var("FIELDTESTER_MQTT_PASSWORD").ok(),
            topic: env::var("FIELDTESTER_MQTT_TOPIC").ok(),
            reconnect_interval_secs: parse_env(
                "FIELDTESTER_MQTT_RECONNECT_INTERVAL_SECS",
                5,
            )?,
        };

        let parser = parse_env("FIELDTESTER_PARSER_TYPE", ParserType::TheThingsStackV3)?;

        let logging = LoggingConfig {
            level: env::var("FIELDTESTER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: parse_env("FIELDTESTER_LOG_FORMAT", LogFormat::Json)?,
        };

        Ok(Config {
            mqtt,
            parser,
            logging,
        })
    }

    pub fn validate(&self) -> Result<()> {
        parse_broker_url(&self.mqtt.broker_url).with_context(|| {
            format!("Invalid FIELDTESTER_MQTT_BROKER: {}", self.mqtt.broker_url)
        })?;

        if let Some(ref topic) = self.mqtt.topic {
            if topic.trim().is_empty() {
                return Err(FieldTesterError::ConfigError(
                    "FIELDTESTER_MQTT_TOPIC must not be empty".to_string(),
                )
                .into());
            }
        }

        if self.mqtt.password.is_some() && self.mqtt.username.is_none() {
            return Err(FieldTesterError::ConfigError(
                "FIELDTESTER_MQTT_PASSWORD set without FIELDTESTER_MQTT_USERNAME".to_string(),
            )
            .into());
        }

        if self.mqtt.reconnect_interval_secs == 0 {
            return Err(FieldTesterError::ConfigError(
                "FIELDTESTER_MQTT_RECONNECT_INTERVAL_SECS must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }

    /// Subscription filter: the configured topic or the parser's default
    pub fn subscribe_topic(&self, parser: &dyn MessageParser) -> String {
        self.mqtt
            .topic
            .clone()
            .unwrap_or_else(|| parser.default_topic().to_string())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    env::var(key)
        .ok()
        .map(|s| {
            s.parse().map_err(|e| {
                anyhow::anyhow!("Failed to parse {}: {}", key, e)
            })
        })
        .transpose()
        .map(|opt| opt.unwrap_or(default))
}
