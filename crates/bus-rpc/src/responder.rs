//! # Responder
//!
//! The serving side of request/response: answers requests arriving on a
//! topic filter by publishing to each request's response topic, echoing its
//! correlation data.

use crate::error::{RpcError, RpcResult};
use async_trait::async_trait;
use bytes::Bytes;
use shared_bus::{Message, MessageHandler, QoS, Transport};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Produces the reply payload for a request.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Handle one request. `None` sends no reply.
    async fn handle(&self, request: &Message) -> Option<Bytes>;
}

/// Adapts a plain function into a [`RequestHandler`].
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> RequestHandler for FnHandler<F>
where
    F: Fn(&Message) -> Option<Bytes> + Send + Sync,
{
    async fn handle(&self, request: &Message) -> Option<Bytes> {
        (self.0)(request)
    }
}

/// Serves requests on one topic filter until stopped or dropped.
pub struct Responder {
    transport: Arc<dyn Transport>,
    filter: String,
    replies_sent: Arc<AtomicU64>,
}

impl Responder {
    /// Register `handler` for `filter` and subscribe to it at `qos`.
    ///
    /// Must be called from within a Tokio runtime; handlers run on it.
    pub async fn serve(
        transport: Arc<dyn Transport>,
        filter: &str,
        qos: QoS,
        handler: Arc<dyn RequestHandler>,
    ) -> RpcResult<Self> {
        let replies_sent = Arc::new(AtomicU64::new(0));
        let callback = request_callback(
            Arc::downgrade(&transport),
            handler,
            replies_sent.clone(),
            Handle::current(),
        );

        transport.register_handler(filter, callback);
        if let Err(e) = transport.subscribe(filter, qos).await {
            transport.unregister_handler(filter);
            return Err(RpcError::Subscription(e));
        }

        info!(filter = filter, qos = %qos, "Responder serving requests");

        Ok(Self {
            transport,
            filter: filter.to_string(),
            replies_sent,
        })
    }

    /// Filter this responder serves.
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Replies published so far.
    pub fn replies_sent(&self) -> u64 {
        self.replies_sent.load(Ordering::Relaxed)
    }

    /// Stop serving: consumes the responder and unregisters its handler.
    ///
    /// The subscription stays on the transport; requests arriving later are
    /// dropped by the router.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        self.transport.unregister_handler(&self.filter);
        debug!(filter = %self.filter, "Responder stopped");
    }
}

fn request_callback(
    transport: Weak<dyn Transport>,
    handler: Arc<dyn RequestHandler>,
    replies_sent: Arc<AtomicU64>,
    runtime: Handle,
) -> MessageHandler {
    Arc::new(move |request: Message| {
        let Some(response_topic) = request.response_topic().map(str::to_owned) else {
            debug!(topic = %request.topic, "Dropping request without response topic");
            return;
        };

        let transport = transport.clone();
        let handler = handler.clone();
        let replies_sent = replies_sent.clone();

        runtime.spawn(async move {
            let Some(payload) = handler.handle(&request).await else {
                return;
            };
            let Some(transport) = transport.upgrade() else {
                return;
            };

            let mut reply = Message::new(response_topic, payload).with_qos(request.qos);
            reply.properties.correlation_data = request.properties.correlation_data.clone();

            let topic = reply.topic.clone();
            match transport.publish(reply).await {
                Ok(()) => {
                    replies_sent.fetch_add(1, Ordering::Relaxed);
                    debug!(request_topic = %request.topic, response_topic = %topic, "Reply published");
                }
                Err(e) => {
                    warn!(
                        request_topic = %request.topic,
                        response_topic = %topic,
                        error = %e,
                        "Failed to publish reply"
                    );
                }
            }
        });
    })
}
