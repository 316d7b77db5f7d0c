//! Login state and the session store that keeps it fresh.
//!
//! SYSTEM CONTEXT
//! ==============
//! The store is the only writer of the current `AuthenticationState`. The
//! popup coordinator refreshes it after a handshake, the orchestrator reads it
//! before matching needs, and UI code observes it through `subscribe()`.
//!
//! DESIGN
//! ======
//! State lives in a `tokio::sync::watch` sender. Every non-cached `check`
//! publishes with `send_replace`, so observers are woken even when the new
//! state equals the old one.

#[cfg(test)]
#[path = "state_test.rs"]
mod state_test;

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::watch;

use crate::error::AuthError;
use crate::need::Need;
use crate::source::StateSource;

/// Converts the raw state payload into an `AuthenticationState`.
pub type LoginStateTransformer = Rc<dyn Fn(Value) -> Result<AuthenticationState, AuthError>>;

/// Authentication state for the current browser session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationState {
    #[serde(default)]
    pub logged_in: bool,
    /// Capabilities granted to the session. Empty when the server sends none.
    #[serde(default)]
    pub needs_provided: Vec<Need>,
    /// Any other fields the state endpoint returns (user name, email, ...).
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl AuthenticationState {
    /// Logged-out state with no needs and no extra fields.
    #[must_use]
    pub fn logged_out() -> Self {
        Self::default()
    }

    /// Look up an extra field returned by the state endpoint.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Owns the canonical login state and refreshes it from a `StateSource`.
pub struct SessionStore {
    source: Rc<dyn StateSource>,
    transformer: Option<LoginStateTransformer>,
    state: watch::Sender<AuthenticationState>,
}

impl SessionStore {
    #[must_use]
    pub fn new(source: Rc<dyn StateSource>, transformer: Option<LoginStateTransformer>) -> Self {
        let (state, _) = watch::channel(AuthenticationState::logged_out());
        Self { source, transformer, state }
    }

    /// Return the session state, fetching it unless the cache may be trusted.
    ///
    /// With `local_state_sufficient` set and a cached logged-in state, the
    /// cached copy is returned without touching the network.
    ///
    /// # Errors
    ///
    /// Propagates fetch, decode and transformer failures. The cached state is
    /// left untouched when that happens.
    pub async fn check(&self, local_state_sufficient: bool) -> Result<AuthenticationState, AuthError> {
        if local_state_sufficient && self.state.borrow().logged_in {
            return Ok(self.current());
        }

        let raw = self.source.fetch_state().await?;
        let next = match &self.transformer {
            Some(transform) => transform(raw)?,
            None => serde_json::from_value(raw)?,
        };
        tracing::debug!(logged_in = next.logged_in, needs = next.needs_provided.len(), "login state refreshed");
        self.state.send_replace(next.clone());
        Ok(next)
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn current(&self) -> AuthenticationState {
        self.state.borrow().clone()
    }

    /// Observe every state replacement.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthenticationState> {
        self.state.subscribe()
    }

    /// Publish a logged-out state without contacting the endpoint.
    pub fn reset(&self) {
        self.state.send_replace(AuthenticationState::logged_out());
    }
}
