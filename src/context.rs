//! The long-lived auth context shared by the whole application.
//!
//! SYSTEM CONTEXT
//! ==============
//! One `AuthContext` owns the options, the session store, the popup
//! coordinator and the orchestrator. Components receive it explicitly; the
//! thread-local `install` exists for hosts that need a single app-wide
//! instance and keeps whichever context was installed first.

#[cfg(test)]
#[path = "context_test.rs"]
mod context_test;

use std::cell::OnceCell;
use std::rc::Rc;

use serde_json::Value;
use tokio::sync::watch;

use crate::authorize::Authorizer;
use crate::channel::MessageChannel;
use crate::config::LoginOptions;
use crate::error::AuthError;
use crate::guard::{NavigationGuard, RetryPolicy};
use crate::need::Need;
use crate::popup::PopupCoordinator;
use crate::source::StateSource;
use crate::state::{AuthenticationState, SessionStore};
use crate::window::{WindowHost, url_with_return};

thread_local! {
    static INSTALLED: OnceCell<AuthContext> = const { OnceCell::new() };
}

/// Host capabilities the context is built on.
#[derive(Clone)]
pub struct Environment {
    pub source: Rc<dyn StateSource>,
    pub channel: Rc<dyn MessageChannel>,
    pub window: Rc<dyn WindowHost>,
}

#[derive(Clone)]
pub struct AuthContext {
    inner: Rc<ContextInner>,
}

struct ContextInner {
    options: Rc<LoginOptions>,
    session: Rc<SessionStore>,
    popup: PopupCoordinator,
    authorizer: Authorizer,
    window: Rc<dyn WindowHost>,
}

impl AuthContext {
    /// Build a standalone context.
    #[must_use]
    pub fn new(options: LoginOptions, env: Environment) -> Self {
        let options = Rc::new(options);
        let session = Rc::new(SessionStore::new(env.source, options.login_state_transformer.clone()));
        let popup = PopupCoordinator::new(Rc::clone(&options), Rc::clone(&session), Rc::clone(&env.window), env.channel);
        let authorizer = Authorizer::new(Rc::clone(&session), popup.clone());
        Self { inner: Rc::new(ContextInner { options, session, popup, authorizer, window: env.window }) }
    }

    /// Install the app-wide context. The first call wins; later calls return
    /// the already-installed context and drop their arguments.
    #[must_use]
    pub fn install(options: LoginOptions, env: Environment) -> Self {
        INSTALLED.with(|cell| {
            if let Some(existing) = cell.get() {
                tracing::debug!("auth context already installed; ignoring new options");
                return existing.clone();
            }
            let ctx = Self::new(options, env);
            tracing::info!(channel = %ctx.options().channel_name, "auth context installed");
            cell.get_or_init(|| ctx).clone()
        })
    }

    /// The context installed by [`AuthContext::install`], if any.
    #[must_use]
    pub fn installed() -> Option<Self> {
        INSTALLED.with(|cell| cell.get().cloned())
    }

    #[must_use]
    pub fn options(&self) -> &LoginOptions {
        &self.inner.options
    }

    #[must_use]
    pub fn popup(&self) -> &PopupCoordinator {
        &self.inner.popup
    }

    #[must_use]
    pub fn authorizer(&self) -> &Authorizer {
        &self.inner.authorizer
    }

    /// Reactive view of the login state; changes on every refresh.
    #[must_use]
    pub fn login_state(&self) -> watch::Receiver<AuthenticationState> {
        self.inner.session.subscribe()
    }

    /// Snapshot of the login state.
    #[must_use]
    pub fn current_state(&self) -> AuthenticationState {
        self.inner.session.current()
    }

    /// See [`SessionStore::check`].
    ///
    /// # Errors
    ///
    /// Propagates fetch, decode and transformer failures.
    pub async fn check(&self, local_state_sufficient: bool) -> Result<AuthenticationState, AuthError> {
        self.inner.session.check(local_state_sufficient).await
    }

    /// See [`PopupCoordinator::login`].
    ///
    /// # Errors
    ///
    /// Fails when the popup is blocked and redirection is declined, or when
    /// the session refresh fails.
    pub async fn login(&self) -> Result<bool, AuthError> {
        self.inner.popup.login().await
    }

    /// See [`PopupCoordinator::show_login_popup`].
    ///
    /// # Errors
    ///
    /// Fails if the handshake is dropped.
    pub async fn show_login_popup(&self) -> Result<Value, AuthError> {
        self.inner.popup.show_login_popup().await
    }

    /// Match needs against the current session state without logging in.
    pub async fn authorize(&self, needs_required: &[Need], needs_provided: &[Need], extra: &Value) -> bool {
        self.inner.authorizer.authorize(needs_required, needs_provided, extra).await
    }

    /// See [`Authorizer::login_and_authorize`].
    ///
    /// # Errors
    ///
    /// Propagates session fetch failures.
    pub async fn login_and_authorize(&self, needs_required: &[Need], extra: &Value) -> Result<bool, AuthError> {
        self.inner.authorizer.login_and_authorize(needs_required, extra).await
    }

    #[must_use]
    pub fn guard(&self, policy: RetryPolicy) -> NavigationGuard {
        NavigationGuard::new(self.inner.authorizer.clone(), policy)
    }

    /// Forget the local session and send the page to the logout URL, asking
    /// to come back to the current page afterwards.
    ///
    /// # Errors
    ///
    /// Fails if the logout URL cannot be built or the host refuses to navigate.
    pub fn logout(&self) -> Result<(), AuthError> {
        let options = &self.inner.options;
        let here = self.inner.window.location()?;
        let url = url_with_return(&here, &options.logout_url, &options.next_query_param, &here)?;
        self.inner.session.reset();
        tracing::info!(url = %url, "logging out");
        self.inner.window.redirect(&url)
    }
}
