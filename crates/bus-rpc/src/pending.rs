//! Pending Request Store - the table of requests waiting for a reply.
//!
//! Maps correlation IDs to the one-shot hand-off slot of the waiting caller.
//!
//! Every entry is removed exactly once. Whoever removes it (the delivery
//! path in `complete`, or the caller in `expire`/`cancel`/`discard_failed`)
//! decides its fate; the other side finds nothing and does nothing.

use crate::correlation::CorrelationId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shared_bus::Message;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// A pending request waiting for a reply
struct PendingRequest {
    /// Slot the reply is handed through
    sender: oneshot::Sender<Message>,
    /// When request was created
    created_at: Instant,
    /// Request topic (for logging)
    topic: String,
}

/// Statistics for pending request store
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Total requests registered
    pub total_registered: AtomicU64,
    /// Total requests answered
    pub total_completed: AtomicU64,
    /// Total requests that hit their deadline
    pub total_timeouts: AtomicU64,
    /// Total requests cancelled or dropped by the caller
    pub total_cancelled: AtomicU64,
    /// Total requests whose publish failed
    pub total_publish_failures: AtomicU64,
    /// Replies discarded because no live request matched them
    pub total_unmatched: AtomicU64,
}

/// Pending request store.
///
/// Flow:
/// 1. Caller calls `register()` to get a correlation ID and a receiver
/// 2. Caller publishes the request carrying the correlation ID
/// 3. Delivery path receives the reply and calls `complete()`
/// 4. Caller awaits the receiver, or gives up and removes its own entry
#[derive(Default)]
pub struct PendingRequestStore {
    /// Map of correlation ID to pending request
    pending: DashMap<CorrelationId, PendingRequest>,
    /// Statistics
    stats: PendingStats,
}

impl PendingRequestStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending request and get a receiver for the reply.
    ///
    /// The returned ID never equals the ID of another live entry.
    pub fn register(&self, topic: &str) -> (CorrelationId, oneshot::Receiver<Message>) {
        let (tx, rx) = oneshot::channel();
        let request = PendingRequest {
            sender: tx,
            created_at: Instant::now(),
            topic: topic.to_string(),
        };

        let correlation_id = loop {
            let candidate = CorrelationId::new();
            match self.pending.entry(candidate) {
                Entry::Vacant(slot) => {
                    slot.insert(request);
                    break candidate;
                }
                Entry::Occupied(_) => {
                    warn!(correlation_id = %candidate, "Correlation ID collision, drawing again");
                }
            }
        };
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);

        debug!(
            correlation_id = %correlation_id,
            topic = topic,
            "Registered pending request"
        );

        (correlation_id, rx)
    }

    /// Complete a pending request with its reply.
    ///
    /// Never blocks: the slot holds exactly one message and this is the only
    /// sender. Returns true if a waiting caller received the reply.
    pub fn complete(&self, correlation_id: &CorrelationId, reply: Message) -> bool {
        let Some((_, pending)) = self.pending.remove(correlation_id) else {
            self.stats.total_unmatched.fetch_add(1, Ordering::Relaxed);
            debug!(
                correlation_id = %correlation_id,
                "Reply for unknown or expired correlation ID"
            );
            return false;
        };

        let response_time = pending.created_at.elapsed();
        match pending.sender.send(reply) {
            Ok(()) => {
                self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %correlation_id,
                    topic = %pending.topic,
                    response_time_ms = response_time.as_millis(),
                    "Completed pending request"
                );
                true
            }
            Err(_) => {
                // Receiver was dropped (request abandoned)
                self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %correlation_id,
                    topic = %pending.topic,
                    "Pending request receiver dropped"
                );
                false
            }
        }
    }

    /// Remove a request whose deadline passed.
    pub fn expire(&self, correlation_id: &CorrelationId) -> bool {
        let Some((_, pending)) = self.pending.remove(correlation_id) else {
            return false;
        };
        self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
        warn!(
            correlation_id = %correlation_id,
            topic = %pending.topic,
            elapsed_ms = pending.created_at.elapsed().as_millis(),
            "Pending request timed out"
        );
        true
    }

    /// Remove a request the caller gave up on.
    pub fn cancel(&self, correlation_id: &CorrelationId) -> bool {
        if self.pending.remove(correlation_id).is_some() {
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            debug!(correlation_id = %correlation_id, "Pending request cancelled");
            true
        } else {
            false
        }
    }

    /// Remove a request whose publish failed.
    pub fn discard_failed(&self, correlation_id: &CorrelationId) -> bool {
        if self.pending.remove(correlation_id).is_some() {
            self.stats.total_publish_failures.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Count a reply that carried no usable correlation data.
    pub fn record_unmatched(&self) {
        self.stats.total_unmatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Get number of currently pending requests
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Check if a correlation ID is pending
    pub fn is_pending(&self, correlation_id: &CorrelationId) -> bool {
        self.pending.contains_key(correlation_id)
    }

    /// Get statistics
    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }
}
