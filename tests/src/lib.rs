//! # Bus-RPC Test Suite
//!
//! End-to-end scenarios: a [`bus_rpc::Correlator`] and one or more serving
//! sessions connected to the same [`shared_bus::InMemoryBroker`].
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── round_trip.rs     # Request/reply through a Responder
//!     ├── concurrency.rs    # Many in-flight requests, permuted replies
//!     ├── cancellation.rs   # Deadlines, cancellation, late replies
//!     └── hygiene.rs        # Malformed replies, retain flag, disconnects
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p rpc-tests
//! cargo test -p rpc-tests integration::concurrency
//! ```
