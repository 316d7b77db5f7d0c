//! Host window capabilities used by the login flow.
//!
//! The coordinator never touches the DOM directly; it asks a `WindowHost` to
//! open a popup, to navigate the whole page, or for the current location.
//! Login URLs are built here so every flow encodes the return URL the same way.

#[cfg(test)]
#[path = "window_test.rs"]
mod window_test;

use url::Url;

use crate::error::AuthError;

/// Result of asking the host for a popup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PopupOpen {
    /// A new window or tab was created.
    Opened,
    /// The host (usually a popup blocker) refused to create one.
    Blocked,
}

/// Navigation primitives of the page running the application.
pub trait WindowHost {
    /// Absolute URL of the current page.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot report its location.
    fn location(&self) -> Result<Url, AuthError>;

    /// Open `url` in a new window or tab.
    fn open_popup(&self, url: &Url) -> PopupOpen;

    /// Navigate the whole page to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Redirect`] if the host refuses the navigation.
    fn redirect(&self, url: &Url) -> Result<(), AuthError>;
}

/// Resolve `target` against `base` and append `<param>=<return_to>`.
///
/// # Errors
///
/// Returns [`AuthError::Url`] if `target` cannot be resolved.
pub fn url_with_return(base: &Url, target: &str, param: &str, return_to: &Url) -> Result<Url, AuthError> {
    let mut url = base.join(target)?;
    url.query_pairs_mut().append_pair(param, return_to.as_str());
    Ok(url)
}
