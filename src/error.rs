//! Error type shared by every authgate component.
//!
//! ERROR HANDLING
//! ==============
//! Transport and transformer failures bubble to the nearest caller unchanged.
//! Authorization outcomes are never errors: "not logged in" and "not
//! permitted" are reported as `Ok(false)`.

/// Error returned by session checks, login attempts and host integrations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The state endpoint could not be reached.
    #[error("state request failed: {0}")]
    Transport(String),
    /// The state endpoint answered with a non-success status.
    #[error("state request failed with status {0}")]
    Status(u16),
    /// The state payload could not be deserialized.
    #[error("failed to decode login state: {0}")]
    Decode(#[from] serde_json::Error),
    /// A user-supplied login state transformer rejected the payload.
    #[error("login state transformer failed: {0}")]
    Transform(String),
    /// The popup was blocked and the popup-failed notifier declined a full-page redirect.
    #[error("login popup was blocked and redirection was declined")]
    RedirectDeclined,
    /// The host refused a full-page navigation.
    #[error("redirect failed: {0}")]
    Redirect(String),
    /// A configured URL could not be resolved against the current location.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    /// Posting on the cross-window message channel failed.
    #[error("message channel error: {0}")]
    Channel(String),
    /// The handshake coordinator went away while a waiter was still pending.
    #[error("login handshake dropped before a message arrived")]
    HandshakeDropped,
}
