//! Fakes for the host seams, shared by unit tests.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use async_trait::async_trait;
use serde_json::{Value, json};
use url::Url;

use crate::channel::{LocalChannel, MessageChannel};
use crate::config::LoginOptions;
use crate::context::{AuthContext, Environment};
use crate::error::AuthError;
use crate::source::StateSource;
use crate::window::{PopupOpen, WindowHost};

pub const PAGE_URL: &str = "https://app.test/projects/7";

pub fn logged_out_payload() -> Value {
    json!({ "loggedIn": false })
}

pub fn logged_in_payload(needs: Value) -> Value {
    json!({ "loggedIn": true, "needsProvided": needs, "name": "Alice" })
}

/// State endpoint double: returns whatever payload was set last.
pub struct FakeSource {
    payload: RefCell<Value>,
    failure: Cell<Option<u16>>,
    fetches: Cell<usize>,
}

impl FakeSource {
    pub fn new(payload: Value) -> Rc<Self> {
        Rc::new(Self { payload: RefCell::new(payload), failure: Cell::new(None), fetches: Cell::new(0) })
    }

    pub fn set_payload(&self, payload: Value) {
        *self.payload.borrow_mut() = payload;
    }

    pub fn fail_with_status(&self, status: u16) {
        self.failure.set(Some(status));
    }

    pub fn fetches(&self) -> usize {
        self.fetches.get()
    }
}

#[async_trait(?Send)]
impl StateSource for FakeSource {
    async fn fetch_state(&self) -> Result<Value, AuthError> {
        self.fetches.set(self.fetches.get() + 1);
        if let Some(status) = self.failure.get() {
            return Err(AuthError::Status(status));
        }
        Ok(self.payload.borrow().clone())
    }
}

/// Window double recording popups and redirects.
pub struct RecordingWindow {
    location: Url,
    blocked: Cell<bool>,
    pub opened: RefCell<Vec<Url>>,
    pub redirects: RefCell<Vec<Url>>,
}

impl RecordingWindow {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            location: Url::parse(PAGE_URL).expect("page url"),
            blocked: Cell::new(false),
            opened: RefCell::new(Vec::new()),
            redirects: RefCell::new(Vec::new()),
        })
    }

    pub fn block_popups(&self) {
        self.blocked.set(true);
    }
}

impl WindowHost for RecordingWindow {
    fn location(&self) -> Result<Url, AuthError> {
        Ok(self.location.clone())
    }

    fn open_popup(&self, url: &Url) -> PopupOpen {
        if self.blocked.get() {
            return PopupOpen::Blocked;
        }
        self.opened.borrow_mut().push(url.clone());
        PopupOpen::Opened
    }

    fn redirect(&self, url: &Url) -> Result<(), AuthError> {
        self.redirects.borrow_mut().push(url.clone());
        Ok(())
    }
}

/// A context wired to fakes, plus handles to drive them.
pub struct Harness {
    pub source: Rc<FakeSource>,
    pub window: Rc<RecordingWindow>,
    pub channel: LocalChannel,
    pub ctx: AuthContext,
}

impl Harness {
    pub fn new(options: LoginOptions, payload: Value) -> Self {
        let source = FakeSource::new(payload);
        let window = RecordingWindow::new();
        let channel = LocalChannel::new(&options.channel_name);
        let env = Environment {
            source: source.clone(),
            channel: Rc::new(channel.clone()),
            window: window.clone(),
        };
        let ctx = AuthContext::new(options, env);
        Self { source, window, channel, ctx }
    }

    /// Simulate the completion page posting on the channel.
    pub fn complete_login(&self) {
        self.channel.post(&json!({ "type": "login-complete" })).expect("post");
    }
}

/// Install a fmt subscriber once per test binary; later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
