//! # Bus RPC - Request/Response over Publish/Subscribe
//!
//! A publish/subscribe bus has no notion of a reply. This crate emulates one:
//!
//! 1. The [`Correlator`] subscribes to a reply topic derived from its client id.
//! 2. Each request carries a fresh [`CorrelationId`] and the reply topic.
//! 3. A [`Responder`] answers on the reply topic, echoing the correlation ID.
//! 4. The correlator's delivery callback hands the reply to the waiting caller.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bus_rpc::{Correlator, CorrelatorConfig};
//! use shared_bus::{InMemoryBroker, Message};
//!
//! let broker = InMemoryBroker::new();
//! let session = broker.connect("client-1");
//! let correlator = Correlator::new(session, CorrelatorConfig::new("client-1")).await?;
//!
//! let reply = correlator.request(Message::new("service/echo", "ping")).await?;
//! ```
//!
//! ## Guarantees
//!
//! - Live correlation IDs are pairwise distinct.
//! - A reply reaches at most one caller, the one whose ID it carries.
//! - Timed-out, cancelled and failed requests leave nothing behind in the
//!   pending table; replies arriving later are discarded.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod config;
pub mod correlation;
pub mod correlator;
pub mod error;
pub mod pending;
pub mod responder;

// Re-export main types
pub use config::{ConfigError, CorrelatorConfig};
pub use correlation::CorrelationId;
pub use correlator::Correlator;
pub use error::{RpcError, RpcResult};
pub use pending::{PendingRequestStore, PendingStats};
pub use responder::{FnHandler, RequestHandler, Responder};
