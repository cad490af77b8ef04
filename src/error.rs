use thiserror::Error;

#[derive(Error, Debug)]
pub enum FieldTesterError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Unsupported port: {0} (expected 1 or 11)")]
    UnsupportedPort(u32),

    #[error("Invalid geometry: latitude {latitude}, longitude {longitude}")]
    InvalidGeometry { latitude: f64, longitude: f64 },

    #[error("MQTT connection error: {0}")]
    MqttError(String),

    #[error("MQTT parsing error: {0}")]
    MqttParseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Base64 error: {0}")]
    Base64Error(#[from] base64::DecodeError),
}

impl FieldTesterError {
    /// Errors that only affect the current message. The service drops the
    /// message and keeps running.
    pub fn is_per_message(&self) -> bool {
        matches!(
            self,
            FieldTesterError::MalformedPayload(_)
                | FieldTesterError::UnsupportedPort(_)
                | FieldTesterError::InvalidGeometry { .. }
                | FieldTesterError::MqttParseError(_)
                | FieldTesterError::JsonError(_)
                | FieldTesterError::Base64Error(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FieldTesterError>;
