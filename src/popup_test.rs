use std::cell::Cell;
use std::pin::pin;

use futures::poll;
use serde_json::json;

use super::*;
use crate::test_helpers::{Harness, PAGE_URL, init_tracing, logged_in_payload, logged_out_payload};

fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs().find(|(k, _)| k == key).map(|(_, v)| v.into_owned())
}

fn declining_redirects() -> LoginOptions {
    LoginOptions::default().with_popup_failed_notifier(|| async { false })
}

fn accepting_redirects() -> LoginOptions {
    LoginOptions::default().with_popup_failed_notifier(|| async { true })
}

// =============================================================================
// Popup opened
// =============================================================================

#[tokio::test]
async fn login_opens_popup_with_complete_url() {
    init_tracing();
    let h = Harness::new(LoginOptions::default(), logged_out_payload());

    let mut login = pin!(h.ctx.login());
    assert!(poll!(login.as_mut()).is_pending());

    let opened = h.window.opened.borrow().clone();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].path(), "/auth/login");
    assert_eq!(query_param(&opened[0], "next").as_deref(), Some("https://app.test/auth/complete"));
    assert_eq!(
        opened[0].as_str(),
        "https://app.test/auth/login?next=https%3A%2F%2Fapp.test%2Fauth%2Fcomplete"
    );
}

#[tokio::test]
async fn login_resolves_with_refreshed_state_after_message() {
    let h = Harness::new(LoginOptions::default(), logged_out_payload());

    let mut login = pin!(h.ctx.login());
    assert!(poll!(login.as_mut()).is_pending());
    assert_eq!(h.ctx.popup().pending_waiters(), 2);
    assert_eq!(h.source.fetches(), 0);

    h.source.set_payload(logged_in_payload(json!(["admin"])));
    h.complete_login();
    assert_eq!(h.ctx.popup().pending_waiters(), 0);

    assert!(login.await.expect("login"));
    assert_eq!(h.source.fetches(), 1);
    assert!(h.ctx.current_state().logged_in);
}

#[tokio::test]
async fn login_resolves_false_when_still_logged_out() {
    let h = Harness::new(LoginOptions::default(), logged_out_payload());

    let mut login = pin!(h.ctx.login());
    assert!(poll!(login.as_mut()).is_pending());
    h.complete_login();

    assert!(!login.await.expect("login"));
}

#[tokio::test]
async fn login_propagates_refresh_failure() {
    let h = Harness::new(LoginOptions::default(), logged_out_payload());

    let mut login = pin!(h.ctx.login());
    assert!(poll!(login.as_mut()).is_pending());
    h.source.fail_with_status(500);
    h.complete_login();

    let err = login.await.expect_err("refresh should fail");
    assert!(matches!(err, AuthError::Status(500)));
}

#[tokio::test]
async fn concurrent_logins_share_one_message() {
    let h = Harness::new(LoginOptions::default(), logged_out_payload());

    let mut first = pin!(h.ctx.login());
    let mut second = pin!(h.ctx.login());
    assert!(poll!(first.as_mut()).is_pending());
    assert!(poll!(second.as_mut()).is_pending());
    assert_eq!(h.ctx.popup().pending_waiters(), 4);
    assert_eq!(h.window.opened.borrow().len(), 2);

    h.source.set_payload(logged_in_payload(json!([])));
    h.complete_login();

    assert!(first.await.expect("first login"));
    assert!(second.await.expect("second login"));
}

#[tokio::test]
async fn waiters_queued_after_a_message_wait_for_the_next_one() {
    let h = Harness::new(LoginOptions::default(), logged_in_payload(json!([])));

    let mut early = pin!(h.ctx.login());
    assert!(poll!(early.as_mut()).is_pending());
    h.complete_login();

    let mut late = pin!(h.ctx.login());
    assert!(poll!(late.as_mut()).is_pending());
    assert!(early.await.expect("early login"));
    assert!(poll!(late.as_mut()).is_pending());
    assert_eq!(h.ctx.popup().pending_waiters(), 2);

    h.complete_login();
    assert!(late.await.expect("late login"));
}

#[tokio::test]
async fn any_payload_completes_the_handshake() {
    let h = Harness::new(LoginOptions::default(), logged_in_payload(json!([])));

    let mut login = pin!(h.ctx.login());
    assert!(poll!(login.as_mut()).is_pending());
    h.channel.post(&json!({ "type": "login-failed" })).expect("post");

    assert!(login.await.expect("login"));
}

// =============================================================================
// Popup blocked
// =============================================================================

#[tokio::test]
async fn blocked_popup_with_declined_redirect_fails() {
    let h = Harness::new(declining_redirects(), logged_out_payload());
    h.window.block_popups();

    let err = h.ctx.login().await.expect_err("login should fail");
    assert!(matches!(err, AuthError::RedirectDeclined));
    assert!(!err.to_string().contains("redirecting"));
    assert!(h.window.redirects.borrow().is_empty());
    assert_eq!(h.ctx.popup().pending_waiters(), 0);
}

#[tokio::test]
async fn blocked_popup_without_notifier_declines() {
    let h = Harness::new(LoginOptions::default(), logged_out_payload());
    h.window.block_popups();

    let err = h.ctx.login().await.expect_err("login should fail");
    assert!(matches!(err, AuthError::RedirectDeclined));
}

#[tokio::test]
async fn blocked_popup_with_accepted_redirect_navigates_away() {
    let h = Harness::new(accepting_redirects(), logged_out_payload());
    h.window.block_popups();

    let mut login = pin!(h.ctx.login());
    assert!(poll!(login.as_mut()).is_pending());

    let redirects = h.window.redirects.borrow().clone();
    assert_eq!(redirects.len(), 1);
    assert_eq!(redirects[0].path(), "/auth/login");
    let landing = Url::parse(&query_param(&redirects[0], "next").expect("next param")).expect("landing url");
    assert_eq!(landing.path(), "/auth/redirection-complete");
    assert_eq!(query_param(&landing, "next").as_deref(), Some(PAGE_URL));

    // The page is unloading: the attempt never settles.
    h.complete_login();
    assert!(poll!(login.as_mut()).is_pending());
}

// =============================================================================
// show_login_popup
// =============================================================================

#[tokio::test]
async fn show_login_popup_runs_notifier_and_waits_for_message() {
    let calls = Rc::new(Cell::new(0_u32));
    let counter = Rc::clone(&calls);
    let options = LoginOptions::default().with_no_access_notifier(move |popup: PopupCoordinator| {
        counter.set(counter.get() + 1);
        async move {
            let _ = popup.login().await;
        }
    });
    let h = Harness::new(options, logged_out_payload());

    let mut shown = pin!(h.ctx.show_login_popup());
    assert!(poll!(shown.as_mut()).is_pending());
    assert_eq!(calls.get(), 1);
    assert_eq!(h.window.opened.borrow().len(), 1);
    assert_eq!(h.ctx.popup().pending_waiters(), 3);

    h.source.set_payload(logged_in_payload(json!([])));
    h.complete_login();

    let message = shown.await.expect("show login popup");
    assert_eq!(message, json!({ "type": "login-complete" }));
}

#[tokio::test]
async fn show_login_popup_without_notifier_still_waits_for_message() {
    let h = Harness::new(LoginOptions::default(), logged_out_payload());

    let mut shown = pin!(h.ctx.show_login_popup());
    assert!(poll!(shown.as_mut()).is_pending());
    assert_eq!(h.ctx.popup().pending_waiters(), 1);

    h.complete_login();
    assert!(shown.await.is_ok());
}
