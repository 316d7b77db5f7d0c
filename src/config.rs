//! Login configuration.
//!
//! DESIGN
//! ======
//! Options are plain data plus three pluggable callbacks. They are handed to
//! `AuthContext` once; a process-wide install keeps the first options it sees
//! and ignores later ones.
//!
//! URLs may be relative. They are resolved against the current page location
//! when a login or logout URL is built.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use serde_json::Value;

use crate::error::AuthError;
use crate::popup::PopupCoordinator;
use crate::state::{AuthenticationState, LoginStateTransformer};

pub const DEFAULT_LOGIN_URL: &str = "/auth/login";
pub const DEFAULT_LOGOUT_URL: &str = "/auth/logout";
pub const DEFAULT_COMPLETE_URL: &str = "/auth/complete";
pub const DEFAULT_REDIRECTION_COMPLETE_URL: &str = "/auth/redirection-complete";
pub const DEFAULT_STATE_URL: &str = "/auth/state";
pub const DEFAULT_NEXT_QUERY_PARAM: &str = "next";
pub const DEFAULT_CHANNEL_NAME: &str = "authgate";

/// Asked whether a full-page redirect is acceptable after the popup was blocked.
pub type PopupFailedNotifier = Rc<dyn Fn() -> LocalBoxFuture<'static, bool>>;

/// Told that access requires a login. Expected to prompt the user and call
/// [`PopupCoordinator::login`] on the handle it receives.
pub type NoAccessNotifier = Rc<dyn Fn(PopupCoordinator) -> LocalBoxFuture<'static, ()>>;

#[derive(Clone)]
pub struct LoginOptions {
    /// Identity-provider entry point opened in the popup.
    pub login_url: String,
    pub logout_url: String,
    /// Page the popup lands on once login finishes; it posts the handshake message.
    pub complete_url: String,
    /// Landing page when login ran as a full-page redirect instead of a popup.
    pub redirection_complete_url: String,
    /// Endpoint returning the login state as JSON. Relative values work in the
    /// browser; native hosts must resolve them first (`HttpStateSource::resolve`).
    pub state_url: String,
    /// Query parameter carrying the return URL.
    pub next_query_param: String,
    /// Name of the cross-window channel shared with the completion page.
    pub channel_name: String,
    pub login_state_transformer: Option<LoginStateTransformer>,
    pub popup_failed_notifier: Option<PopupFailedNotifier>,
    pub no_access_notifier: Option<NoAccessNotifier>,
}

impl Default for LoginOptions {
    fn default() -> Self {
        Self {
            login_url: DEFAULT_LOGIN_URL.to_owned(),
            logout_url: DEFAULT_LOGOUT_URL.to_owned(),
            complete_url: DEFAULT_COMPLETE_URL.to_owned(),
            redirection_complete_url: DEFAULT_REDIRECTION_COMPLETE_URL.to_owned(),
            state_url: DEFAULT_STATE_URL.to_owned(),
            next_query_param: DEFAULT_NEXT_QUERY_PARAM.to_owned(),
            channel_name: DEFAULT_CHANNEL_NAME.to_owned(),
            login_state_transformer: None,
            popup_failed_notifier: None,
            no_access_notifier: None,
        }
    }
}

impl fmt::Debug for LoginOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginOptions")
            .field("login_url", &self.login_url)
            .field("logout_url", &self.logout_url)
            .field("complete_url", &self.complete_url)
            .field("redirection_complete_url", &self.redirection_complete_url)
            .field("state_url", &self.state_url)
            .field("next_query_param", &self.next_query_param)
            .field("channel_name", &self.channel_name)
            .field("login_state_transformer", &self.login_state_transformer.is_some())
            .field("popup_failed_notifier", &self.popup_failed_notifier.is_some())
            .field("no_access_notifier", &self.no_access_notifier.is_some())
            .finish()
    }
}

impl LoginOptions {
    /// Defaults overlaid with environment variables.
    ///
    /// - `AUTHGATE_LOGIN_URL`
    /// - `AUTHGATE_LOGOUT_URL`
    /// - `AUTHGATE_COMPLETE_URL`
    /// - `AUTHGATE_REDIRECTION_COMPLETE_URL`
    /// - `AUTHGATE_STATE_URL`
    /// - `AUTHGATE_NEXT_QUERY_PARAM`
    /// - `AUTHGATE_CHANNEL_NAME`
    ///
    /// Empty values are ignored. Callbacks are never read from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            login_url: env_or("AUTHGATE_LOGIN_URL", DEFAULT_LOGIN_URL),
            logout_url: env_or("AUTHGATE_LOGOUT_URL", DEFAULT_LOGOUT_URL),
            complete_url: env_or("AUTHGATE_COMPLETE_URL", DEFAULT_COMPLETE_URL),
            redirection_complete_url: env_or("AUTHGATE_REDIRECTION_COMPLETE_URL", DEFAULT_REDIRECTION_COMPLETE_URL),
            state_url: env_or("AUTHGATE_STATE_URL", DEFAULT_STATE_URL),
            next_query_param: env_or("AUTHGATE_NEXT_QUERY_PARAM", DEFAULT_NEXT_QUERY_PARAM),
            channel_name: env_or("AUTHGATE_CHANNEL_NAME", DEFAULT_CHANNEL_NAME),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_login_state_transformer<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value) -> Result<AuthenticationState, AuthError> + 'static,
    {
        self.login_state_transformer = Some(Rc::new(transform));
        self
    }

    #[must_use]
    pub fn with_popup_failed_notifier<F, Fut>(mut self, notify: F) -> Self
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = bool> + 'static,
    {
        self.popup_failed_notifier = Some(Rc::new(move || notify().boxed_local()));
        self
    }

    #[must_use]
    pub fn with_no_access_notifier<F, Fut>(mut self, notify: F) -> Self
    where
        F: Fn(PopupCoordinator) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        self.no_access_notifier = Some(Rc::new(move |coordinator: PopupCoordinator| notify(coordinator).boxed_local()));
        self
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_owned())
}
