//! Correlator configuration with validation.

use serde::{Deserialize, Serialize};
use shared_bus::{validate_topic_name, QoS};
use std::time::Duration;
use thiserror::Error;

/// Placeholder replaced by the client id in `response_topic_fmt`.
pub const CLIENT_ID_PLACEHOLDER: &str = "{client_id}";

/// Default response topic pattern.
pub const DEFAULT_RESPONSE_TOPIC_FMT: &str = "responses/{client_id}";

/// Default deadline for [`Correlator::request`](crate::Correlator::request).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("response topic pattern '{0}' has no {{client_id}} placeholder")]
    MissingPlaceholder(String),

    #[error("invalid client id: {0}")]
    InvalidClientId(String),

    #[error("invalid response topic: {0}")]
    InvalidResponseTopic(String),

    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
}

/// Correlator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelatorConfig {
    /// Pattern for the reply topic; `{client_id}` is substituted.
    pub response_topic_fmt: String,
    /// Identity of this client. Must be a single legal topic level.
    pub client_id: String,
    /// QoS for the reply topic subscription.
    #[serde(with = "qos_level")]
    pub subscribe_qos: QoS,
    /// Deadline applied by `request`; `None` waits indefinitely.
    #[serde(with = "humantime_serde")]
    pub default_timeout: Option<Duration>,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            response_topic_fmt: DEFAULT_RESPONSE_TOPIC_FMT.to_string(),
            client_id: String::new(),
            subscribe_qos: QoS::AtLeastOnce,
            default_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

impl CorrelatorConfig {
    /// Configuration for `client_id` using the default topic pattern.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_response_topic_fmt(mut self, fmt: impl Into<String>) -> Self {
        self.response_topic_fmt = fmt.into();
        self
    }

    #[must_use]
    pub fn with_subscribe_qos(mut self, qos: QoS) -> Self {
        self.subscribe_qos = qos;
        self
    }

    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Concrete reply topic for this client.
    pub fn response_topic(&self) -> String {
        self.response_topic_fmt
            .replace(CLIENT_ID_PLACEHOLDER, &self.client_id)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.response_topic_fmt.contains(CLIENT_ID_PLACEHOLDER) {
            return Err(ConfigError::MissingPlaceholder(
                self.response_topic_fmt.clone(),
            ));
        }

        if self.client_id.is_empty() {
            return Err(ConfigError::InvalidClientId("client id is empty".into()));
        }
        if self.client_id.contains(['/', '+', '#', '\0']) {
            return Err(ConfigError::InvalidClientId(format!(
                "'{}' is not a single topic level",
                self.client_id
            )));
        }

        validate_topic_name(&self.response_topic())
            .map_err(|e| ConfigError::InvalidResponseTopic(e.to_string()))?;

        if self.default_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::InvalidTimeout(
                "default timeout cannot be 0".into(),
            ));
        }

        Ok(())
    }
}

/// Serialize [`QoS`] as its numeric level.
mod qos_level {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use shared_bus::QoS;

    pub fn serialize<S: Serializer>(qos: &QoS, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*qos))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<QoS, D::Error> {
        let level = u8::deserialize(deserializer)?;
        QoS::try_from(level)
            .map_err(|v| de::Error::custom(format!("QoS must be 0, 1 or 2, got {v}")))
    }
}
