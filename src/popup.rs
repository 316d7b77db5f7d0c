//! Popup login handshake.
//!
//! STATE MACHINE
//! =============
//! Each `login()` attempt moves through
//! `Idle -> PopupRequested -> AwaitingMessage -> Resolved | Failed`.
//!
//! - PopupRequested: the host is asked to open `<login>?<next>=<complete>`.
//! - AwaitingMessage: two waiters are queued, a refresh waiter then a
//!   resolving waiter, so the session is refreshed before the caller sees
//!   the result.
//! - Failed: the popup was blocked. The popup-failed notifier decides between
//!   a full-page redirect (the attempt never settles, the page unloads) and
//!   [`AuthError::RedirectDeclined`].
//!
//! TRADE-OFFS
//! ==========
//! Waiters are not correlated with attempts. Any message on the channel drains
//! the whole queue, so concurrent `login()` calls all settle on the first
//! completion. Attempt ids only show up in logs.

#[cfg(test)]
#[path = "popup_test.rs"]
mod popup_test;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::future;
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use crate::channel::MessageChannel;
use crate::config::LoginOptions;
use crate::error::AuthError;
use crate::state::SessionStore;
use crate::window::{PopupOpen, WindowHost, url_with_return};

enum Waiter {
    /// Non-terminal: the owning attempt refreshes the session when woken.
    Refresh(oneshot::Sender<()>),
    /// Terminal: hands the message to a suspended caller.
    Resolve(oneshot::Sender<Value>),
}

impl Waiter {
    fn wake(self, message: &Value) {
        // A closed receiver means the caller stopped waiting.
        match self {
            Self::Refresh(tx) => {
                let _ = tx.send(());
            }
            Self::Resolve(tx) => {
                let _ = tx.send(message.clone());
            }
        }
    }
}

/// Opens login popups and settles callers when the completion message arrives.
///
/// Cheap to clone; clones share the waiter queue and channel subscription.
#[derive(Clone)]
pub struct PopupCoordinator {
    inner: Rc<CoordinatorInner>,
}

struct CoordinatorInner {
    options: Rc<LoginOptions>,
    session: Rc<SessionStore>,
    window: Rc<dyn WindowHost>,
    channel: Rc<dyn MessageChannel>,
    waiters: RefCell<VecDeque<Waiter>>,
}

impl CoordinatorInner {
    fn drain(&self, message: &Value) {
        let woken: Vec<Waiter> = self.waiters.borrow_mut().drain(..).collect();
        tracing::debug!(channel = self.channel.name(), waiters = woken.len(), "handshake message received");
        for waiter in woken {
            waiter.wake(message);
        }
    }
}

impl PopupCoordinator {
    /// Build a coordinator and subscribe it to `channel`.
    #[must_use]
    pub fn new(
        options: Rc<LoginOptions>,
        session: Rc<SessionStore>,
        window: Rc<dyn WindowHost>,
        channel: Rc<dyn MessageChannel>,
    ) -> Self {
        let inner = Rc::new(CoordinatorInner {
            options,
            session,
            window,
            channel,
            waiters: RefCell::new(VecDeque::new()),
        });

        // Weak so the channel's handler list does not keep the coordinator alive.
        let weak = Rc::downgrade(&inner);
        inner.channel.subscribe(Rc::new(move |message: Value| {
            if let Some(inner) = weak.upgrade() {
                inner.drain(&message);
            }
        }));

        Self { inner }
    }

    #[must_use]
    pub fn session(&self) -> &Rc<SessionStore> {
        &self.inner.session
    }

    /// Number of waiters queued for the next handshake message.
    #[must_use]
    pub fn pending_waiters(&self) -> usize {
        self.inner.waiters.borrow().len()
    }

    fn enqueue(&self, waiter: Waiter) {
        self.inner.waiters.borrow_mut().push_back(waiter);
    }

    /// Open the login popup and wait for the handshake to finish.
    ///
    /// Resolves with the refreshed `logged_in` flag. When the popup is blocked
    /// and the popup-failed notifier accepts a redirect, the page navigates
    /// away and the returned future never resolves.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RedirectDeclined`] when the popup is blocked and
    /// redirection is refused, and propagates URL, redirect and session
    /// refresh failures.
    pub async fn login(&self) -> Result<bool, AuthError> {
        let attempt = Uuid::new_v4();
        let options = &self.inner.options;
        let here = self.inner.window.location()?;
        let complete = here.join(&options.complete_url)?;
        let popup_url = url_with_return(&here, &options.login_url, &options.next_query_param, &complete)?;

        match self.inner.window.open_popup(&popup_url) {
            PopupOpen::Opened => {
                tracing::info!(%attempt, url = %popup_url, "login popup opened");
                let (refresh_tx, refresh_rx) = oneshot::channel();
                let (resolve_tx, resolve_rx) = oneshot::channel();
                self.enqueue(Waiter::Refresh(refresh_tx));
                self.enqueue(Waiter::Resolve(resolve_tx));

                refresh_rx.await.map_err(|_| AuthError::HandshakeDropped)?;
                let state = self.inner.session.check(false).await?;
                resolve_rx.await.map_err(|_| AuthError::HandshakeDropped)?;

                tracing::info!(%attempt, logged_in = state.logged_in, "login handshake finished");
                Ok(state.logged_in)
            }
            PopupOpen::Blocked => {
                tracing::warn!(%attempt, "login popup blocked");
                if !self.redirect_allowed().await {
                    tracing::warn!(%attempt, "redirect to login page declined");
                    return Err(AuthError::RedirectDeclined);
                }
                let redirect_url = self.redirect_url(&here)?;
                self.inner.window.redirect(&redirect_url)?;
                tracing::info!(%attempt, url = %redirect_url, "redirecting to login page");
                // The document unloads; this attempt is abandoned.
                future::pending().await
            }
        }
    }

    /// Wait for the next handshake after asking the user to log in.
    ///
    /// The resolving waiter is queued before the no-access notifier runs, so a
    /// `login()` started by the notifier settles this call too. Returns the
    /// message payload; callers re-check the session afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::HandshakeDropped`] if the coordinator is dropped
    /// before a message arrives.
    pub async fn show_login_popup(&self) -> Result<Value, AuthError> {
        let (resolve_tx, resolve_rx) = oneshot::channel();
        self.enqueue(Waiter::Resolve(resolve_tx));

        match &self.inner.options.no_access_notifier {
            Some(notify) => notify(self.clone()).await,
            None => tracing::error!("login required but no no-access notifier configured; waiting for an external login"),
        }

        resolve_rx.await.map_err(|_| AuthError::HandshakeDropped)
    }

    async fn redirect_allowed(&self) -> bool {
        match &self.inner.options.popup_failed_notifier {
            Some(notify) => notify().await,
            None => {
                tracing::warn!("no popup-failed notifier configured");
                false
            }
        }
    }

    /// `<login>?<next>=<redirection-complete>?<next>=<current page>`.
    fn redirect_url(&self, here: &Url) -> Result<Url, AuthError> {
        let options = &self.inner.options;
        let landing = url_with_return(here, &options.redirection_complete_url, &options.next_query_param, here)?;
        url_with_return(here, &options.login_url, &options.next_query_param, &landing)
    }
}
