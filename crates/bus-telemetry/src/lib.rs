//! # Bus Telemetry
//!
//! Logging setup shared by the bus-rpc tools.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bus_telemetry::{init_logging, TelemetryConfig};
//!
//! let config = TelemetryConfig::for_service("rpc-demo");
//! init_logging(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RPC_SERVICE_NAME` | `bus-rpc` | Service name in logs |
//! | `RPC_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `RPC_JSON_LOGS` | `false` | Emit JSON lines |
//! | `RPC_LOG_THREAD_IDS` | `false` | Include thread ids |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{env_filter, init_logging};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Global subscriber already installed: {0}")]
    AlreadyInitialized(String),
}

/// Span wrapping the whole run of a service.
///
/// # Example
///
/// ```rust,ignore
/// run().instrument(bus_telemetry::service_span!("rpc-demo", client_id = "demo")).await;
/// ```
#[macro_export]
macro_rules! service_span {
    ($name:expr $(, $($field:tt)*)?) => {
        tracing::info_span!("service", service = $name $(, $($field)*)?)
    };
}
