//! # Shared Bus - Publish/Subscribe Transport
//!
//! An in-process message bus with MQTT-style topics. It is the transport
//! collaborator the request/response layer (`bus-rpc`) is built on.
//!
//! ## Model
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │  Session A   │                    │  Session B   │
//! │              │    publish()       │   Router     │
//! │              │ ──────┐            │  (handlers)  │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │ delivery task
//!                  │    Broker    │          │
//!                  │ (filters,    │ ─────────┘
//!                  │  retained)   │  subscribe()
//!                  └──────────────┘
//! ```
//!
//! - Every session owns a [`Router`] and a delivery task; handlers never run
//!   on the publisher's stack.
//! - Messages carry optional metadata ([`Properties`]): correlation data and a
//!   response topic, which is all a request/response layer needs.
//! - Retained messages are stored as the last value of a topic and replayed
//!   to new subscribers.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod broker;
pub mod message;
pub mod router;
pub mod topic;
pub mod transport;

// Re-export main types
pub use broker::{BrokerSession, BrokerStats, InMemoryBroker};
pub use message::{Message, Properties, QoS};
pub use router::Router;
pub use topic::{topic_matches, validate_topic_filter, validate_topic_name};
pub use transport::{MessageHandler, Transport, TransportError};

/// Separator between topic levels.
pub const TOPIC_SEPARATOR: char = '/';

/// Wildcard matching exactly one topic level.
pub const SINGLE_LEVEL_WILDCARD: char = '+';

/// Wildcard matching all remaining topic levels.
pub const MULTI_LEVEL_WILDCARD: char = '#';
