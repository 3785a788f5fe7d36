//! # Transport
//!
//! The interface a client of the bus programs against. The in-memory
//! [`BrokerSession`](crate::broker::BrokerSession) implements it; a network
//! client would implement the same trait.

use crate::message::{Message, QoS};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Callback invoked for every message delivered on a matching topic.
///
/// Runs on the transport's delivery context, concurrently with publishers.
pub type MessageHandler = Arc<dyn Fn(Message) + Send + Sync>;

/// Errors from transport operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The session is closed or was never connected.
    #[error("not connected")]
    NotConnected,

    /// A topic name or filter is malformed.
    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    /// The broker refused a subscription.
    #[error("subscription to '{filter}' rejected: {reason}")]
    SubscribeRejected { filter: String, reason: String },

    /// The message could not be handed to the broker.
    #[error("publish failed: {0}")]
    PublishFailed(String),
}

/// Publish/subscribe transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Publish a message.
    async fn publish(&self, message: Message) -> Result<(), TransportError>;

    /// Subscribe to a topic filter.
    ///
    /// # Returns
    ///
    /// The QoS granted by the broker.
    async fn subscribe(&self, filter: &str, qos: QoS) -> Result<QoS, TransportError>;

    /// Register a callback for messages delivered on topics matching `filter`.
    ///
    /// Registering a filter twice replaces the earlier callback.
    fn register_handler(&self, filter: &str, handler: MessageHandler);

    /// Remove the callback registered for `filter`, if any.
    fn unregister_handler(&self, filter: &str);

    /// Whether a callback is registered for exactly `filter`.
    fn has_handler(&self, filter: &str) -> bool;
}
