//! Navigation guard for routes that declare required needs.
//!
//! DESIGN
//! ======
//! A route with `authorization` metadata is entered only once
//! `login_and_authorize` succeeds. Attempts repeat per `RetryPolicy`
//! (bounded by default) and an optional abort registration cancels the wait,
//! including a login handshake that never completes.
//!
//! Every retry suspends on a login handshake. A logged-in user who was denied
//! is prompted again and the session is refreshed before the next attempt.

#[cfg(test)]
#[path = "guard_test.rs"]
mod guard_test;

use std::num::NonZeroU32;

use futures::future::{AbortRegistration, Abortable, Aborted};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::authorize::Authorizer;
use crate::error::AuthError;
use crate::need::Need;

pub const DEFAULT_MAX_ATTEMPTS: NonZeroU32 = match NonZeroU32::new(3) {
    Some(n) => n,
    None => NonZeroU32::MIN,
};

/// Route metadata consulted before navigation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteMeta {
    /// `None` means the route is unrestricted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<RouteAuthorization>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteAuthorization {
    /// Any one of these grants access. Empty means "logged in is enough".
    #[serde(default)]
    pub needs_required: Vec<Need>,
}

impl RouteMeta {
    #[must_use]
    pub fn unrestricted() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn requiring(needs_required: Vec<Need>) -> Self {
        Self { authorization: Some(RouteAuthorization { needs_required }) }
    }
}

/// How many denied attempts the guard makes before giving up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Give up after this many denied attempts.
    Bounded(NonZeroU32),
    /// Keep prompting until access is granted or the guard is cancelled.
    Unbounded,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::Bounded(DEFAULT_MAX_ATTEMPTS)
    }
}

/// Outcome of [`NavigationGuard::before_navigate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavigationDecision {
    Proceed,
    Denied { attempts: u32 },
    Cancelled,
}

/// Gates navigation into routes that carry `authorization` metadata.
#[derive(Clone)]
pub struct NavigationGuard {
    authorizer: Authorizer,
    policy: RetryPolicy,
}

impl NavigationGuard {
    #[must_use]
    pub fn new(authorizer: Authorizer, policy: RetryPolicy) -> Self {
        Self { authorizer, policy }
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Decide whether navigation to a route with `meta` may continue.
    ///
    /// # Errors
    ///
    /// Propagates session fetch failures from any attempt.
    pub async fn before_navigate(
        &self,
        meta: &RouteMeta,
        extra: &Value,
        cancel: Option<AbortRegistration>,
    ) -> Result<NavigationDecision, AuthError> {
        let Some(authorization) = &meta.authorization else {
            return Ok(NavigationDecision::Proceed);
        };

        let attempts = self.attempt_until_granted(&authorization.needs_required, extra);
        match cancel {
            None => attempts.await,
            Some(registration) => match Abortable::new(attempts, registration).await {
                Ok(decision) => decision,
                Err(Aborted) => {
                    tracing::info!("navigation guard cancelled");
                    Ok(NavigationDecision::Cancelled)
                }
            },
        }
    }

    async fn attempt_until_granted(
        &self,
        needs_required: &[Need],
        extra: &Value,
    ) -> Result<NavigationDecision, AuthError> {
        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            if self.authorizer.login_and_authorize(needs_required, extra).await? {
                return Ok(NavigationDecision::Proceed);
            }
            if let RetryPolicy::Bounded(max) = self.policy {
                if attempts >= max.get() {
                    tracing::warn!(attempts, "navigation denied");
                    return Ok(NavigationDecision::Denied { attempts });
                }
            }
            tracing::info!(attempt = attempts, "authorization denied; retrying");
            // A logged-in user was denied and the cached session would deny
            // again. Wait for a fresh login before the next attempt.
            if self.authorizer.logged_in() {
                self.authorizer.request_new_grants().await?;
            }
        }
    }
}
