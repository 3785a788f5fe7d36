//! # Messages
//!
//! Defines the message that flows through the bus together with its
//! delivery level and metadata.

use bytes::Bytes;
use std::fmt;

/// Delivery level requested for a message or granted for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum QoS {
    /// Fire and forget.
    #[default]
    AtMostOnce = 0,
    /// Delivered at least once.
    AtLeastOnce = 1,
    /// Delivered exactly once.
    ExactlyOnce = 2,
}

impl TryFrom<u8> for QoS {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::AtMostOnce),
            1 => Ok(Self::AtLeastOnce),
            2 => Ok(Self::ExactlyOnce),
            other => Err(other),
        }
    }
}

impl From<QoS> for u8 {
    fn from(qos: QoS) -> Self {
        qos as u8
    }
}

impl fmt::Display for QoS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// Optional message metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    /// Opaque token echoed by a responder to match a reply to its request.
    pub correlation_data: Option<Bytes>,
    /// Topic the sender expects replies on.
    pub response_topic: Option<String>,
    /// MIME type of the payload.
    pub content_type: Option<String>,
    /// Free-form key/value pairs. Order is preserved and keys may repeat.
    pub user: Vec<(String, String)>,
}

impl Properties {
    /// First user property value stored under `key`.
    #[must_use]
    pub fn user_get(&self, key: &str) -> Option<&str> {
        self.user
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Append a user property.
    pub fn user_add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.user.push((key.into(), value.into()));
    }
}

/// A message published to, or delivered from, the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Topic name the message is published on.
    pub topic: String,
    /// Opaque payload.
    pub payload: Bytes,
    /// Delivery level.
    pub qos: QoS,
    /// Keep as the last value of the topic for future subscribers.
    pub retain: bool,
    /// Metadata.
    pub properties: Properties,
}

impl Message {
    /// Create an at-most-once, non-retained message.
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtMostOnce,
            retain: false,
            properties: Properties::default(),
        }
    }

    #[must_use]
    pub fn with_qos(mut self, qos: QoS) -> Self {
        self.qos = qos;
        self
    }

    #[must_use]
    pub fn with_retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    #[must_use]
    pub fn with_correlation_data(mut self, data: impl Into<Bytes>) -> Self {
        self.properties.correlation_data = Some(data.into());
        self
    }

    #[must_use]
    pub fn with_response_topic(mut self, topic: impl Into<String>) -> Self {
        self.properties.response_topic = Some(topic.into());
        self
    }

    #[must_use]
    pub fn with_user_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.user_add(key, value);
        self
    }

    /// Correlation data, if any.
    #[must_use]
    pub fn correlation_data(&self) -> Option<&Bytes> {
        self.properties.correlation_data.as_ref()
    }

    /// Response topic, if any.
    #[must_use]
    pub fn response_topic(&self) -> Option<&str> {
        self.properties.response_topic.as_deref()
    }
}
