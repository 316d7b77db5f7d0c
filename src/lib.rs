//! # authgate
//!
//! Popup login handshake and need-based authorization for single-page apps.
//!
//! The crate opens a login page in a popup, waits for the completion page to
//! post on a shared message channel, refreshes the login state from the state
//! endpoint and gates actions or routes on declarative needs.
//!
//! Host specifics sit behind three seams: [`source::StateSource`] (state
//! endpoint), [`channel::MessageChannel`] (cross-window messages) and
//! [`window::WindowHost`] (popup and navigation). The `hydrate` feature
//! provides browser implementations in [`web`].

pub mod authorize;
pub mod channel;
pub mod config;
pub mod context;
pub mod error;
pub mod guard;
pub mod need;
pub mod popup;
pub mod source;
pub mod state;
#[cfg(feature = "hydrate")]
pub mod web;
pub mod window;

#[cfg(test)]
mod test_helpers;

pub use authorize::Authorizer;
pub use config::LoginOptions;
pub use context::{AuthContext, Environment};
pub use error::AuthError;
pub use guard::{NavigationDecision, NavigationGuard, RetryPolicy, RouteMeta};
pub use need::{Need, authorize};
pub use popup::PopupCoordinator;
pub use state::{AuthenticationState, SessionStore};
