//! Browser bindings: DOM `BroadcastChannel`, `window.open` and `location`.
//!
//! All of this is gated behind `#[cfg(feature = "hydrate")]` since it
//! requires a browser environment.

use std::rc::Rc;

use serde_json::Value;
use url::Url;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::closure::Closure;

use crate::channel::{MessageChannel, MessageHandler};
use crate::config::LoginOptions;
use crate::context::{AuthContext, Environment};
use crate::error::AuthError;
use crate::source::HttpStateSource;
use crate::window::{PopupOpen, WindowHost};

fn js_error(err: &JsValue) -> String {
    err.as_string().unwrap_or_else(|| format!("{err:?}"))
}

/// Messages arrive either as JSON strings or structured-clone objects.
fn message_payload(data: &JsValue) -> Value {
    if let Some(text) = data.as_string() {
        return serde_json::from_str(&text).unwrap_or(Value::String(text));
    }
    js_sys::JSON::stringify(data)
        .ok()
        .map(String::from)
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or(Value::Null)
}

/// DOM `BroadcastChannel`, open for the lifetime of the page.
pub struct BroadcastChannelHandle {
    name: String,
    channel: web_sys::BroadcastChannel,
}

impl BroadcastChannelHandle {
    /// # Errors
    ///
    /// Returns [`AuthError::Channel`] if the browser cannot create the channel.
    pub fn open(name: &str) -> Result<Self, AuthError> {
        let channel = web_sys::BroadcastChannel::new(name).map_err(|e| AuthError::Channel(js_error(&e)))?;
        Ok(Self { name: name.to_owned(), channel })
    }
}

impl MessageChannel for BroadcastChannelHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn post(&self, message: &Value) -> Result<(), AuthError> {
        let text = serde_json::to_string(message)?;
        self.channel
            .post_message(&JsValue::from_str(&text))
            .map_err(|e| AuthError::Channel(js_error(&e)))
    }

    fn subscribe(&self, handler: MessageHandler) {
        let listener = Closure::<dyn FnMut(web_sys::MessageEvent)>::new(move |event: web_sys::MessageEvent| {
            handler(message_payload(&event.data()));
        });
        if let Err(e) = self
            .channel
            .add_event_listener_with_callback("message", listener.as_ref().unchecked_ref())
        {
            log_listener_error(&self.name, &e);
        }
        // The channel is never closed, so the listener lives as long as the page.
        listener.forget();
    }
}

fn log_listener_error(name: &str, err: &JsValue) {
    tracing::error!(channel = name, error = %js_error(err), "failed to subscribe to broadcast channel");
}

/// The page's own `window`.
pub struct BrowserWindow;

impl WindowHost for BrowserWindow {
    fn location(&self) -> Result<Url, AuthError> {
        let window = web_sys::window().ok_or_else(|| AuthError::Redirect("no window".to_owned()))?;
        let href = window.location().href().map_err(|e| AuthError::Redirect(js_error(&e)))?;
        Ok(Url::parse(&href)?)
    }

    fn open_popup(&self, url: &Url) -> PopupOpen {
        let Some(window) = web_sys::window() else {
            return PopupOpen::Blocked;
        };
        match window.open_with_url_and_target(url.as_str(), "_blank") {
            Ok(Some(_)) => PopupOpen::Opened,
            Ok(None) | Err(_) => PopupOpen::Blocked,
        }
    }

    fn redirect(&self, url: &Url) -> Result<(), AuthError> {
        let window = web_sys::window().ok_or_else(|| AuthError::Redirect("no window".to_owned()))?;
        window
            .location()
            .set_href(url.as_str())
            .map_err(|e| AuthError::Redirect(js_error(&e)))
    }
}

impl Environment {
    /// Browser environment: `BroadcastChannel` named after the options,
    /// `window` navigation and a `gloo-net` state source.
    ///
    /// # Errors
    ///
    /// Returns an error if the broadcast channel cannot be opened.
    pub fn browser(options: &LoginOptions) -> Result<Self, AuthError> {
        Ok(Self {
            source: Rc::new(HttpStateSource::new(options.state_url.clone())),
            channel: Rc::new(BroadcastChannelHandle::open(&options.channel_name)?),
            window: Rc::new(BrowserWindow),
        })
    }
}

/// Install the app-wide context for this page. First call wins.
///
/// # Errors
///
/// Returns an error if the broadcast channel cannot be opened.
pub fn install_browser(options: LoginOptions) -> Result<AuthContext, AuthError> {
    if let Some(existing) = AuthContext::installed() {
        return Ok(existing);
    }
    let env = Environment::browser(&options)?;
    Ok(AuthContext::install(options, env))
}

/// Run on the completion page: tell the opener the login finished, then close.
///
/// If the window cannot close itself (it was not opened by script), a
/// `{"type": "close-failed"}` message is posted so the opener can react.
///
/// # Errors
///
/// Returns an error if the channel cannot be opened or posted to.
pub fn complete_popup_login(channel_name: &str, payload: &Value) -> Result<(), AuthError> {
    let channel = BroadcastChannelHandle::open(channel_name)?;
    channel.post(payload)?;
    let closed = web_sys::window().is_some_and(|w| w.close().is_ok() && w.closed().unwrap_or(false));
    if !closed {
        channel.post(&serde_json::json!({ "type": "close-failed" }))?;
    }
    Ok(())
}
