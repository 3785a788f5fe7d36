//! # In-Memory Broker
//!
//! A single-process broker. Each connected [`BrokerSession`] implements
//! [`Transport`]; messages published by any session are fanned out to every
//! session holding a matching subscription.
//!
//! Delivery is asynchronous: every session owns a queue drained by its own
//! tokio task, which hands messages to the session's [`Router`].

use crate::message::{Message, QoS};
use crate::router::Router;
use crate::topic::{topic_matches, validate_topic_filter, validate_topic_name};
use crate::transport::{MessageHandler, Transport, TransportError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Snapshot of broker counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStats {
    /// Messages accepted for publishing.
    pub published: u64,
    /// Messages queued for delivery to sessions (one per receiving session).
    pub delivered: u64,
    /// Topics currently holding a retained message.
    pub retained: usize,
}

/// Per-session state shared between the broker, the session handle and the
/// delivery task.
struct SessionShared {
    client_id: String,
    router: Router,
    subscriptions: RwLock<Vec<(String, QoS)>>,
    outbox: mpsc::UnboundedSender<Message>,
    connected: AtomicBool,
}

impl SessionShared {
    /// Highest QoS granted by any subscription matching `topic`.
    fn granted_for(&self, topic: &str) -> Option<QoS> {
        self.subscriptions
            .read()
            .iter()
            .filter(|(filter, _)| topic_matches(filter, topic))
            .map(|(_, qos)| *qos)
            .max()
    }
}

struct BrokerInner {
    sessions: RwLock<HashMap<u64, Arc<SessionShared>>>,
    retained: RwLock<BTreeMap<String, Message>>,
    next_session: AtomicU64,
    max_qos: QoS,
    published: AtomicU64,
    delivered: AtomicU64,
}

impl BrokerInner {
    fn fan_out(&self, message: &Message) -> usize {
        let sessions = self.sessions.read();
        let mut receivers = 0;

        for session in sessions.values() {
            if !session.connected.load(Ordering::Acquire) {
                continue;
            }
            let Some(granted) = session.granted_for(&message.topic) else {
                continue;
            };

            let mut copy = message.clone();
            copy.retain = false;
            copy.qos = message.qos.min(granted);

            if session.outbox.send(copy).is_ok() {
                receivers += 1;
            }
        }

        self.delivered.fetch_add(receivers as u64, Ordering::Relaxed);
        receivers
    }

    fn store_retained(&self, message: &Message) {
        let mut retained = self.retained.write();
        if message.payload.is_empty() {
            retained.remove(&message.topic);
            debug!(topic = %message.topic, "Retained message cleared");
        } else {
            retained.insert(message.topic.clone(), message.clone());
            debug!(topic = %message.topic, "Retained message stored");
        }
    }
}

/// In-process publish/subscribe broker.
///
/// Cheap to clone; clones share the same topic space.
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<BrokerInner>,
}

impl InMemoryBroker {
    /// Create a broker granting every requested QoS.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_qos(QoS::ExactlyOnce)
    }

    /// Create a broker that downgrades subscriptions to at most `max_qos`.
    #[must_use]
    pub fn with_max_qos(max_qos: QoS) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                sessions: RwLock::new(HashMap::new()),
                retained: RwLock::new(BTreeMap::new()),
                next_session: AtomicU64::new(1),
                max_qos,
                published: AtomicU64::new(0),
                delivered: AtomicU64::new(0),
            }),
        }
    }

    /// Open a session for `client_id`.
    ///
    /// Spawns the session's delivery task, so this must be called from
    /// within a Tokio runtime.
    pub fn connect(&self, client_id: impl Into<String>) -> Arc<BrokerSession> {
        let client_id = client_id.into();
        let (outbox, mut inbox) = mpsc::unbounded_channel::<Message>();
        let shared = Arc::new(SessionShared {
            client_id: client_id.clone(),
            router: Router::new(),
            subscriptions: RwLock::new(Vec::new()),
            outbox,
            connected: AtomicBool::new(true),
        });

        let id = self.inner.next_session.fetch_add(1, Ordering::Relaxed);
        self.inner.sessions.write().insert(id, shared.clone());

        // The task only holds a weak reference: once the session is gone the
        // sender is dropped and the queue drains to completion.
        let weak: Weak<SessionShared> = Arc::downgrade(&shared);
        tokio::spawn(async move {
            while let Some(message) = inbox.recv().await {
                let Some(session) = weak.upgrade() else {
                    break;
                };
                if !session.connected.load(Ordering::Acquire) {
                    continue;
                }
                trace!(
                    client_id = %session.client_id,
                    topic = %message.topic,
                    "Delivering message"
                );
                session.router.route(message);
            }
        });

        debug!(client_id = %client_id, session = id, "Session connected");

        Arc::new(BrokerSession {
            id,
            broker: self.inner.clone(),
            shared,
        })
    }

    /// Number of open sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.inner.sessions.read().len()
    }

    /// Retained message currently stored for `topic`.
    #[must_use]
    pub fn retained(&self, topic: &str) -> Option<Message> {
        self.inner.retained.read().get(topic).cloned()
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> BrokerStats {
        BrokerStats {
            published: self.inner.published.load(Ordering::Relaxed),
            delivered: self.inner.delivered.load(Ordering::Relaxed),
            retained: self.inner.retained.read().len(),
        }
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

/// A client connection to an [`InMemoryBroker`].
pub struct BrokerSession {
    id: u64,
    broker: Arc<BrokerInner>,
    shared: Arc<SessionShared>,
}

impl BrokerSession {
    /// Client identifier given at connect time.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.shared.client_id
    }

    /// Whether the session can still publish and subscribe.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Close the session. Later operations fail with
    /// [`TransportError::NotConnected`] and nothing more is delivered.
    pub fn disconnect(&self) {
        if self.shared.connected.swap(false, Ordering::AcqRel) {
            self.shared.subscriptions.write().clear();
            debug!(client_id = %self.shared.client_id, "Session disconnected");
        }
    }

    /// Drop the subscription for `filter`.
    ///
    /// Returns true if the session was subscribed to it.
    pub fn unsubscribe(&self, filter: &str) -> bool {
        let mut subscriptions = self.shared.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|(f, _)| f != filter);
        before != subscriptions.len()
    }

    /// Filters this session is subscribed to, with their granted QoS.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<(String, QoS)> {
        self.shared.subscriptions.read().clone()
    }

    fn ensure_connected(&self) -> Result<(), TransportError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }
}

impl Drop for BrokerSession {
    fn drop(&mut self) {
        self.broker.sessions.write().remove(&self.id);
        debug!(client_id = %self.shared.client_id, "Session dropped");
    }
}

#[async_trait]
impl Transport for BrokerSession {
    async fn publish(&self, message: Message) -> Result<(), TransportError> {
        self.ensure_connected()?;
        validate_topic_name(&message.topic)?;

        self.broker.published.fetch_add(1, Ordering::Relaxed);
        if message.retain {
            self.broker.store_retained(&message);
        }

        let receivers = self.broker.fan_out(&message);
        debug!(
            client_id = %self.shared.client_id,
            topic = %message.topic,
            qos = %message.qos,
            receivers = receivers,
            "Message published"
        );
        Ok(())
    }

    async fn subscribe(&self, filter: &str, qos: QoS) -> Result<QoS, TransportError> {
        self.ensure_connected()?;
        validate_topic_filter(filter)?;

        let granted = qos.min(self.broker.max_qos);
        {
            let mut subscriptions = self.shared.subscriptions.write();
            if let Some(slot) = subscriptions.iter_mut().find(|(f, _)| f == filter) {
                slot.1 = granted;
            } else {
                subscriptions.push((filter.to_string(), granted));
            }
        }

        let retained: Vec<Message> = self
            .broker
            .retained
            .read()
            .values()
            .filter(|m| topic_matches(filter, &m.topic))
            .cloned()
            .collect();
        for mut message in retained {
            message.retain = true;
            message.qos = message.qos.min(granted);
            if self.shared.outbox.send(message).is_ok() {
                self.broker.delivered.fetch_add(1, Ordering::Relaxed);
            }
        }

        debug!(
            client_id = %self.shared.client_id,
            filter = filter,
            granted = %granted,
            "Subscribed"
        );
        Ok(granted)
    }

    fn register_handler(&self, filter: &str, handler: MessageHandler) {
        self.shared.router.register_handler(filter, handler);
    }

    fn unregister_handler(&self, filter: &str) {
        self.shared.router.unregister_handler(filter);
    }

    fn has_handler(&self, filter: &str) -> bool {
        self.shared.router.has_handler(filter)
    }
}
