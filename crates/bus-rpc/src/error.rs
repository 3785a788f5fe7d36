//! Error types for request/response calls.

use crate::config::ConfigError;
use shared_bus::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Result alias for correlator operations.
pub type RpcResult<T> = Result<T, RpcError>;

/// Errors surfaced by [`Correlator`](crate::Correlator) and
/// [`Responder`](crate::Responder).
///
/// Replies that cannot be matched are not errors; the delivery path drops
/// them without surfacing anything.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// The configuration was rejected before touching the transport.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Another correlator on the same transport already listens on this
    /// reply topic. Each correlator sharing a session needs its own client id.
    #[error("response topic {0} already has a handler")]
    ResponseTopicInUse(String),

    /// Subscribing to the reply (or request) topic failed. The instance was
    /// not created.
    #[error("subscription failed: {0}")]
    Subscription(TransportError),

    /// Publishing the request failed. Nothing is left pending.
    #[error("publish failed: {0}")]
    Publish(TransportError),

    /// The caller's cancellation signal fired before a reply arrived.
    #[error("request cancelled")]
    Cancelled,

    /// No reply arrived before the deadline.
    #[error("request timed out after {0:?}")]
    TimedOut(Duration),

    /// The hand-off slot was dropped without a reply.
    #[error("reply channel closed")]
    Closed,
}

impl RpcError {
    /// True for [`RpcError::TimedOut`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }

    /// True for [`RpcError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The underlying transport error, if this is one.
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            Self::Subscription(e) | Self::Publish(e) => Some(e),
            _ => None,
        }
    }
}
