//! # Correlator
//!
//! Synchronous request/response calls over a publish/subscribe transport.
//!
//! ```text
//!  request()                                       delivery callback
//!  ─────────                                       ─────────────────
//!  register(id) ──► ┌──────────────────────┐ ◄── complete(id, reply)
//!                   │ PendingRequestStore  │
//!  wait(slot)   ◄── │  id → oneshot slot   │
//!                   └──────────────────────┘
//!  publish(request + id + response_topic)  ──► bus ──► responder
//!                                                         │
//!  reply on response_topic  ◄──────────────── bus ◄───────┘
//! ```

use crate::config::CorrelatorConfig;
use crate::correlation::CorrelationId;
use crate::error::{RpcError, RpcResult};
use crate::pending::{PendingRequestStore, PendingStats};
use shared_bus::{Message, MessageHandler, Transport};
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info};

/// Request/response client bound to one reply topic.
///
/// Requests may be issued concurrently from any number of tasks through a
/// shared reference.
pub struct Correlator {
    /// Transport used to publish requests
    transport: Arc<dyn Transport>,
    /// Requests waiting for a reply
    pending: Arc<PendingRequestStore>,
    /// Topic replies arrive on
    response_topic: String,
    /// Deadline used by `request`
    default_timeout: Option<Duration>,
}

impl Correlator {
    /// Create a correlator and start listening on its reply topic.
    ///
    /// The delivery callback is registered before subscribing and the call
    /// only returns once the subscription is in place, so no reply can
    /// arrive before the correlator listens for it.
    ///
    /// A correlator owns its reply topic on `transport`: creating a second
    /// one with the same client id on the same transport fails with
    /// [`RpcError::ResponseTopicInUse`].
    pub async fn new(transport: Arc<dyn Transport>, config: CorrelatorConfig) -> RpcResult<Self> {
        config.validate()?;

        let response_topic = config.response_topic();
        if transport.has_handler(&response_topic) {
            return Err(RpcError::ResponseTopicInUse(response_topic));
        }
        let pending = Arc::new(PendingRequestStore::new());

        transport.register_handler(&response_topic, reply_handler(Arc::downgrade(&pending)));

        match transport
            .subscribe(&response_topic, config.subscribe_qos)
            .await
        {
            Ok(granted) => {
                info!(
                    response_topic = %response_topic,
                    requested_qos = %config.subscribe_qos,
                    granted_qos = %granted,
                    "Correlator listening for replies"
                );
            }
            Err(e) => {
                transport.unregister_handler(&response_topic);
                return Err(RpcError::Subscription(e));
            }
        }

        Ok(Self {
            transport,
            pending,
            response_topic,
            default_timeout: config.default_timeout,
        })
    }

    /// Send `message` and wait for its reply, bounded by the configured
    /// default timeout.
    pub async fn request(&self, message: Message) -> RpcResult<Message> {
        self.request_with_cancel(message, self.default_timeout, std::future::pending())
            .await
    }

    /// Send `message` and wait at most `timeout` for its reply.
    pub async fn request_timeout(&self, message: Message, timeout: Duration) -> RpcResult<Message> {
        self.request_with_cancel(message, Some(timeout), std::future::pending())
            .await
    }

    /// Send `message` and wait for its reply until `timeout` elapses or
    /// `cancel` completes, whichever comes first.
    ///
    /// The deadline and the cancellation cover both the publish and the wait.
    /// Dropping the returned future also withdraws the request.
    pub async fn request_with_cancel<C>(
        &self,
        mut message: Message,
        timeout: Option<Duration>,
        cancel: C,
    ) -> RpcResult<Message>
    where
        C: Future<Output = ()>,
    {
        let (correlation_id, mut reply) = self.pending.register(&message.topic);
        let _guard = PendingGuard {
            store: &self.pending,
            correlation_id,
        };

        message.properties.correlation_data = Some(correlation_id.to_bytes());
        message.properties.response_topic = Some(self.response_topic.clone());
        message.retain = false;
        let topic = message.topic.clone();

        let exchange = async {
            self.transport
                .publish(message)
                .await
                .map_err(RpcError::Publish)?;
            debug!(
                correlation_id = %correlation_id,
                topic = %topic,
                "Request published, awaiting reply"
            );
            (&mut reply).await.map_err(|_| RpcError::Closed)
        };

        let bounded = async {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, exchange)
                    .await
                    .unwrap_or(Err(RpcError::TimedOut(limit))),
                None => exchange.await,
            }
        };

        let result = tokio::select! {
            result = bounded => result,
            () = cancel => Err(RpcError::Cancelled),
        };

        match result {
            Ok(response) => Ok(response),
            Err(RpcError::Publish(e)) => {
                self.pending.discard_failed(&correlation_id);
                Err(RpcError::Publish(e))
            }
            Err(err @ (RpcError::TimedOut(_) | RpcError::Cancelled)) => {
                let removed = if err.is_timeout() {
                    self.pending.expire(&correlation_id)
                } else {
                    self.pending.cancel(&correlation_id)
                };
                if removed {
                    Err(err)
                } else {
                    // The delivery path removed the entry first; its reply
                    // is already in the slot.
                    reply.try_recv().map_err(|_| err)
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Topic replies are expected on.
    pub fn response_topic(&self) -> &str {
        &self.response_topic
    }

    /// Number of requests currently waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.pending.pending_count()
    }

    /// Whether `correlation_id` names a request still waiting for a reply.
    pub fn is_pending(&self, correlation_id: &CorrelationId) -> bool {
        self.pending.is_pending(correlation_id)
    }

    /// Request statistics.
    pub fn stats(&self) -> &PendingStats {
        self.pending.stats()
    }
}

impl Drop for Correlator {
    fn drop(&mut self) {
        self.transport.unregister_handler(&self.response_topic);
    }
}

/// Removes the entry when a request future is dropped before finishing.
struct PendingGuard<'a> {
    store: &'a PendingRequestStore,
    correlation_id: CorrelationId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.store.cancel(&self.correlation_id);
    }
}

/// Delivery callback for the reply topic.
fn reply_handler(pending: Weak<PendingRequestStore>) -> MessageHandler {
    Arc::new(move |message: Message| {
        let Some(pending) = pending.upgrade() else {
            return;
        };

        let Some(correlation_id) = message
            .correlation_data()
            .and_then(|data| CorrelationId::from_bytes(data))
        else {
            pending.record_unmatched();
            debug!(topic = %message.topic, "Discarding reply without usable correlation data");
            return;
        };

        pending.complete(&correlation_id, message);
    })
}
