//! Remote login-state endpoint access.
//!
//! Browser (hydrate): `GET` via `gloo-net`, cookies ride along same-origin.
//! Native: `GET` via `reqwest`; the URL must be absolute.
//!
//! ERROR HANDLING
//! ==============
//! Transport failures and non-success statuses are returned to the session
//! store untouched. Nothing here retries.

#![allow(clippy::unused_async)]

#[cfg(all(test, feature = "native", not(feature = "hydrate")))]
#[path = "source_test.rs"]
mod source_test;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::error::AuthError;

/// Produces the raw login-state payload.
#[async_trait(?Send)]
pub trait StateSource {
    /// Fetch the current login state as raw JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is unreachable, answers with a
    /// non-success status, or returns a body that is not JSON.
    async fn fetch_state(&self) -> Result<Value, AuthError>;
}

/// `GET <state_url>` returning the login state as JSON.
pub struct HttpStateSource {
    url: String,
    #[cfg(all(feature = "native", not(feature = "hydrate")))]
    client: reqwest::Client,
}

impl HttpStateSource {
    /// Use `url` as given.
    ///
    /// The native client only accepts absolute URLs; a relative one such as
    /// the default `/auth/state` fails every fetch with
    /// [`AuthError::Transport`]. Use [`HttpStateSource::resolve`] for those.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            #[cfg(all(feature = "native", not(feature = "hydrate")))]
            client: reqwest::Client::new(),
        }
    }

    /// Resolve a possibly relative `state_url` against `base` (the app origin
    /// or current page).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Url`] if the joined URL is invalid.
    pub fn resolve(base: &Url, state_url: &str) -> Result<Self, AuthError> {
        Ok(Self::new(base.join(state_url)?))
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait(?Send)]
impl StateSource for HttpStateSource {
    async fn fetch_state(&self) -> Result<Value, AuthError> {
        #[cfg(feature = "hydrate")]
        {
            let resp = gloo_net::http::Request::get(&self.url)
                .send()
                .await
                .map_err(|e| AuthError::Transport(e.to_string()))?;
            if !resp.ok() {
                return Err(AuthError::Status(resp.status()));
            }
            resp.json::<Value>().await.map_err(|e| AuthError::Transport(e.to_string()))
        }
        #[cfg(all(feature = "native", not(feature = "hydrate")))]
        {
            let resp = self
                .client
                .get(&self.url)
                .send()
                .await
                .map_err(|e| AuthError::Transport(e.to_string()))?;
            let status = resp.status();
            if !status.is_success() {
                return Err(AuthError::Status(status.as_u16()));
            }
            resp.json::<Value>().await.map_err(|e| AuthError::Transport(e.to_string()))
        }
        #[cfg(not(any(feature = "native", feature = "hydrate")))]
        {
            Err(AuthError::Transport(format!("no http backend enabled for {}", self.url)))
        }
    }
}
