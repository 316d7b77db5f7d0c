//! Authorization orchestrator: ensure a session, then match needs.
//!
//! SYSTEM CONTEXT
//! ==============
//! Application code calls `login_and_authorize` before protected actions; the
//! navigation guard calls it before entering protected routes. The outcome is
//! always a boolean; only transport failures surface as errors.

#[cfg(test)]
#[path = "authorize_test.rs"]
mod authorize_test;

use std::rc::Rc;

use serde_json::Value;

use crate::error::AuthError;
use crate::need::{self, Need};
use crate::popup::PopupCoordinator;
use crate::state::SessionStore;

/// Ensures a session exists and matches needs against it.
#[derive(Clone)]
pub struct Authorizer {
    session: Rc<SessionStore>,
    popup: PopupCoordinator,
}

impl Authorizer {
    #[must_use]
    pub fn new(session: Rc<SessionStore>, popup: PopupCoordinator) -> Self {
        Self { session, popup }
    }

    /// Make sure the user is logged in, then check `needs_required`.
    ///
    /// 1. Trust a cached logged-in state.
    /// 2. Otherwise ask for a login and wait for one handshake; still logged
    ///    out afterwards means `false`.
    /// 3. No requirements means `true`; otherwise match against the provided
    ///    needs of the state just obtained.
    ///
    /// # Errors
    ///
    /// Propagates session fetch failures and a dropped handshake.
    pub async fn login_and_authorize(&self, needs_required: &[Need], extra: &Value) -> Result<bool, AuthError> {
        let mut state = self.session.check(true).await?;
        if !state.logged_in {
            self.popup.show_login_popup().await?;
            state = self.session.check(false).await?;
            if !state.logged_in {
                tracing::info!("still logged out after login prompt");
                return Ok(false);
            }
        }

        if needs_required.is_empty() {
            return Ok(true);
        }
        Ok(need::authorize(&state, needs_required, &state.needs_provided, extra).await)
    }

    /// Whether the cached session is logged in.
    #[must_use]
    pub fn logged_in(&self) -> bool {
        self.session.current().logged_in
    }

    /// Prompt for another login and refresh the session once the handshake
    /// message arrives, so grants obtained in the meantime become visible.
    ///
    /// # Errors
    ///
    /// Propagates a dropped handshake and session fetch failures.
    pub async fn request_new_grants(&self) -> Result<(), AuthError> {
        self.popup.show_login_popup().await?;
        self.session.check(false).await?;
        Ok(())
    }

    /// Match `needs_required` against `needs_provided` using the current state.
    pub async fn authorize(&self, needs_required: &[Need], needs_provided: &[Need], extra: &Value) -> bool {
        let state = self.session.current();
        need::authorize(&state, needs_required, needs_provided, extra).await
    }
}
