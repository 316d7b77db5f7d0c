use super::*;

// =============================================================================
// from_env: env manipulation requires unsafe in edition 2024.
// All env assertions live in one test so parallel tests cannot race on them.
// =============================================================================

const KEYS: [&str; 7] = [
    "AUTHGATE_LOGIN_URL",
    "AUTHGATE_LOGOUT_URL",
    "AUTHGATE_COMPLETE_URL",
    "AUTHGATE_REDIRECTION_COMPLETE_URL",
    "AUTHGATE_STATE_URL",
    "AUTHGATE_NEXT_QUERY_PARAM",
    "AUTHGATE_CHANNEL_NAME",
];

/// # Safety
/// Only called from `from_env_overlays_defaults`, the sole test touching these vars.
unsafe fn clear_env() {
    for key in KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

#[test]
fn defaults_point_at_auth_routes() {
    let options = LoginOptions::default();
    assert_eq!(options.login_url, "/auth/login");
    assert_eq!(options.logout_url, "/auth/logout");
    assert_eq!(options.complete_url, "/auth/complete");
    assert_eq!(options.redirection_complete_url, "/auth/redirection-complete");
    assert_eq!(options.state_url, "/auth/state");
    assert_eq!(options.next_query_param, "next");
    assert_eq!(options.channel_name, "authgate");
    assert!(options.popup_failed_notifier.is_none());
    assert!(options.no_access_notifier.is_none());
}

#[test]
fn from_env_overlays_defaults() {
    unsafe {
        clear_env();
        std::env::set_var("AUTHGATE_LOGIN_URL", "https://idp.test/login");
        std::env::set_var("AUTHGATE_NEXT_QUERY_PARAM", "return_to");
        std::env::set_var("AUTHGATE_CHANNEL_NAME", "   ");
    }
    let options = LoginOptions::from_env();
    assert_eq!(options.login_url, "https://idp.test/login");
    assert_eq!(options.next_query_param, "return_to");
    assert_eq!(options.channel_name, DEFAULT_CHANNEL_NAME);
    assert_eq!(options.state_url, DEFAULT_STATE_URL);

    unsafe { clear_env() };
    let options = LoginOptions::from_env();
    assert_eq!(options.login_url, DEFAULT_LOGIN_URL);
}

#[test]
fn debug_hides_callbacks() {
    let options = LoginOptions::default().with_popup_failed_notifier(|| async { true });
    let rendered = format!("{options:?}");
    assert!(rendered.contains("popup_failed_notifier: true"));
    assert!(rendered.contains("no_access_notifier: false"));
}

#[tokio::test]
async fn builders_wrap_callbacks() {
    let options = LoginOptions::default()
        .with_popup_failed_notifier(|| async { true })
        .with_login_state_transformer(|raw| Ok(serde_json::from_value(raw)?));

    let notify = options.popup_failed_notifier.clone().expect("notifier");
    assert!(notify().await);

    let transform = options.login_state_transformer.clone().expect("transformer");
    let state = transform(serde_json::json!({ "loggedIn": true })).expect("state");
    assert!(state.logged_in);
}
