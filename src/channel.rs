//! Cross-window message channel abstraction.
//!
//! SYSTEM CONTEXT
//! ==============
//! The completion page of the login flow posts a message on a channel whose
//! name both ends agree on. The popup coordinator subscribes once and treats
//! every message as "the handshake finished", whatever the payload.
//!
//! `LocalChannel` delivers in-process and backs tests and same-document
//! flows. The browser implementation over `BroadcastChannel` lives in
//! `crate::web`.

#[cfg(test)]
#[path = "channel_test.rs"]
mod channel_test;

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

use crate::error::AuthError;

/// Callback invoked for every message received on a channel.
pub type MessageHandler = Rc<dyn Fn(Value)>;

/// Publish/subscribe over an opaque JSON payload.
pub trait MessageChannel {
    /// Channel name shared by both ends of the handshake.
    fn name(&self) -> &str;

    /// Publish a message to every subscriber of this channel.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Channel`] when the underlying primitive rejects the message.
    fn post(&self, message: &Value) -> Result<(), AuthError>;

    /// Register a handler for incoming messages. Handlers live as long as the channel.
    fn subscribe(&self, handler: MessageHandler);
}

/// In-process channel. Clones share one subscriber list.
#[derive(Clone)]
pub struct LocalChannel {
    name: Rc<str>,
    subscribers: Rc<RefCell<Vec<MessageHandler>>>,
}

impl LocalChannel {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self { name: Rc::from(name), subscribers: Rc::new(RefCell::new(Vec::new())) }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

impl MessageChannel for LocalChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn post(&self, message: &Value) -> Result<(), AuthError> {
        // Snapshot so handlers may subscribe or post without a double borrow.
        let handlers: Vec<MessageHandler> = self.subscribers.borrow().clone();
        for handler in handlers {
            handler(message.clone());
        }
        Ok(())
    }

    fn subscribe(&self, handler: MessageHandler) {
        self.subscribers.borrow_mut().push(handler);
    }
}
