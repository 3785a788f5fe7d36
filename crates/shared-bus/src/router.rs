//! # Router
//!
//! Dispatches delivered messages to the handlers registered for matching
//! topic filters.

use crate::message::Message;
use crate::topic::topic_matches;
use crate::transport::MessageHandler;
use parking_lot::RwLock;
use tracing::debug;

/// Filter-keyed handler table.
#[derive(Default)]
pub struct Router {
    handlers: RwLock<Vec<(String, MessageHandler)>>,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `filter`, replacing any handler already
    /// registered for the same filter.
    pub fn register_handler(&self, filter: &str, handler: MessageHandler) {
        let mut handlers = self.handlers.write();
        if let Some(slot) = handlers.iter_mut().find(|(f, _)| f == filter) {
            slot.1 = handler;
        } else {
            handlers.push((filter.to_string(), handler));
        }
        debug!(filter = filter, "Handler registered");
    }

    /// Remove the handler registered for `filter`.
    ///
    /// Returns true if a handler was removed.
    pub fn unregister_handler(&self, filter: &str) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(f, _)| f != filter);
        before != handlers.len()
    }

    /// Whether a handler is registered for exactly `filter`.
    #[must_use]
    pub fn has_handler(&self, filter: &str) -> bool {
        self.handlers.read().iter().any(|(f, _)| f == filter)
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Invoke every handler whose filter matches the message topic.
    ///
    /// Returns the number of handlers invoked.
    pub fn route(&self, message: Message) -> usize {
        // Handlers may register or unregister while running, so call them
        // outside the lock.
        let matching: Vec<MessageHandler> = self
            .handlers
            .read()
            .iter()
            .filter(|(filter, _)| topic_matches(filter, &message.topic))
            .map(|(_, handler)| handler.clone())
            .collect();

        if matching.is_empty() {
            debug!(topic = %message.topic, "No handler for delivered message");
            return 0;
        }

        for handler in &matching {
            handler(message.clone());
        }
        matching.len()
    }
}
