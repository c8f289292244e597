//! OAuth2 callback handling on mount

use grading_lib::auth::callback::{
    ACCESS_DENIED_MESSAGE, GOOGLE_LOGIN_FAILED_MESSAGE, INVALID_CALLBACK_MESSAGE,
    SESSION_EXPIRED_MESSAGE,
};
use grading_lib::auth::{Navigator, Notice};
use grading_lib::RenderState;

use super::test_harness::{api_base, TestApp};

#[tokio::test]
async fn test_callback_tokens_are_persisted_and_url_scrubbed() {
    let mut server = mockito::Server::new_async().await;
    let any = server
        .mock("POST", mockito::Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let test = TestApp::new(
        &api_base(&server),
        "http://console.test/oauth2/callback?accessToken=google-a&refreshToken=google-r",
    );

    assert_eq!(test.app.orchestrator.mount().await, RenderState::Authenticated);
    any.assert_async().await;

    let stored = test.stored();
    assert_eq!(stored["accessToken"], "google-a");
    assert_eq!(stored["refreshToken"], "google-r");
    assert!(!stored.contains_key("user"));

    let visible = test.navigator.current_url();
    assert_eq!(visible.as_str(), "http://console.test/");
}

#[tokio::test]
async fn test_callback_error_messages() {
    let cases = [
        (
            "OAuth2%20authentication%20failed%3A%20%5Bauthorization_request_not_found%5D",
            SESSION_EXPIRED_MESSAGE,
        ),
        ("access_denied", ACCESS_DENIED_MESSAGE),
        ("temporarily_unavailable", GOOGLE_LOGIN_FAILED_MESSAGE),
    ];

    for (error, expected) in cases {
        let server = mockito::Server::new_async().await;
        let test = TestApp::new(
            &api_base(&server),
            &format!("http://console.test/oauth2/callback?error={}", error),
        );

        assert_eq!(test.app.orchestrator.mount().await, RenderState::Unauthenticated);
        assert!(test.stored().is_empty(), "nothing stored for {}", error);
        assert!(test.notices().contains(&Notice::error(expected)), "message for {}", error);
        assert_eq!(test.navigator.current_url().query(), None);
    }
}

#[tokio::test]
async fn test_error_wins_over_tokens() {
    let server = mockito::Server::new_async().await;
    let test = TestApp::new(
        &api_base(&server),
        "http://console.test/oauth2/callback?accessToken=a&refreshToken=r&error=access_denied",
    );

    assert_eq!(test.app.orchestrator.mount().await, RenderState::Unauthenticated);
    assert!(test.stored().is_empty());
}

#[tokio::test]
async fn test_half_a_token_pair_is_invalid() {
    let server = mockito::Server::new_async().await;
    let test = TestApp::new(
        &api_base(&server),
        "http://console.test/oauth2/callback?accessToken=only-access",
    );

    assert_eq!(test.app.orchestrator.mount().await, RenderState::Unauthenticated);
    assert!(test.stored().is_empty());
    assert!(test.notices().contains(&Notice::error(INVALID_CALLBACK_MESSAGE)));
    assert_eq!(test.navigator.current_url().path(), "/");
}

#[tokio::test]
async fn test_callback_path_without_parameters_is_ordinary_startup() {
    let server = mockito::Server::new_async().await;
    let test = TestApp::new(&api_base(&server), "http://console.test/oauth2/callback");

    assert_eq!(test.app.orchestrator.mount().await, RenderState::Unauthenticated);
    assert!(test.notices().is_empty());
    assert_eq!(test.navigator.current_url().path(), "/oauth2/callback");
}

#[tokio::test]
async fn test_failure_redirect_to_login_page_is_handled() {
    let server = mockito::Server::new_async().await;
    let test = TestApp::seeded(
        &api_base(&server),
        "http://console.test/login?error=OAuth2%2520authentication%2520failed%253A%2520%255Bauthorization_request_not_found%255D",
        serde_json::json!({"accessToken": "old-a", "refreshToken": "old-r"}),
    );

    assert_eq!(test.app.orchestrator.mount().await, RenderState::Unauthenticated);
    assert!(test.stored().is_empty());
    assert!(test.notices().contains(&Notice::error(SESSION_EXPIRED_MESSAGE)));
    assert_eq!(test.navigator.current_url().as_str(), "http://console.test/");
}

#[tokio::test]
async fn test_plain_login_page_is_ordinary_startup() {
    let server = mockito::Server::new_async().await;
    let test = TestApp::new(&api_base(&server), "http://console.test/login");

    assert_eq!(test.app.orchestrator.mount().await, RenderState::Unauthenticated);
    assert!(test.notices().is_empty());
    assert_eq!(test.navigator.current_url().path(), "/login");
}
