//! User actions: login, registration, logout, Google sign-in and password flows

use mockito::Matcher;
use serde_json::json;

use grading_lib::auth::orchestrator::{
    LOGIN_FAILED_MESSAGE, LOGIN_SUCCESS_MESSAGE, LOGOUT_SUCCESS_MESSAGE,
};
use grading_lib::auth::Notice;
use grading_lib::{RegisterRequest, RegistrationPolicy, RenderState, Route, RouteDecision};

use super::test_harness::{api_base, grant_body, TestApp, UNREACHABLE_API};

fn registration() -> RegisterRequest {
    RegisterRequest {
        username: "thu".to_string(),
        password: "secret1".to_string(),
        email: "thu@example.edu".to_string(),
        full_name: "Thu Nguyen".to_string(),
    }
}

#[tokio::test]
async fn test_login_stores_all_three_entries() {
    let mut server = mockito::Server::new_async().await;
    let login = server
        .mock("POST", "/api/auth/login")
        .match_body(Matcher::Json(json!({"username": "thu", "password": "secret1"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(grant_body("a1", "r1", "ADMIN"))
        .create_async()
        .await;

    let test = TestApp::new(&api_base(&server), "http://console.test/");
    let orchestrator = &test.app.orchestrator;
    orchestrator.mount().await;

    let user = orchestrator.login("thu", "secret1").await.unwrap();
    login.assert_async().await;

    assert_eq!(user.full_name, "Thu Nguyen");
    assert_eq!(orchestrator.state().await, RenderState::Authenticated);
    assert!(test.notices().contains(&Notice::success(LOGIN_SUCCESS_MESSAGE)));

    let stored = test.stored();
    assert_eq!(stored["accessToken"], "a1");
    assert_eq!(stored["refreshToken"], "r1");
    assert!(stored.contains_key("user"));
    assert_eq!(orchestrator.guard(Route::AdminDashboard), RouteDecision::Allow);
}

#[tokio::test]
async fn test_login_validation_errors_reach_the_form() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/auth/login")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "apiPath": "uri=/api/auth/login",
                "errorCode": "BAD_REQUEST",
                "errorMessage": "Validation failed",
                "validationErrors": {"username": "must not be blank"}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let test = TestApp::new(&api_base(&server), "http://console.test/");
    test.app.orchestrator.mount().await;

    let feedback = test.app.orchestrator.login("", "secret1").await.unwrap_err();
    assert_eq!(
        feedback.field_errors.get("username").map(String::as_str),
        Some("must not be blank")
    );
    assert_eq!(test.app.orchestrator.state().await, RenderState::Unauthenticated);
    assert!(test.stored().is_empty());
}

#[tokio::test]
async fn test_bad_credentials_show_server_message() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/auth/login")
        .with_status(401)
        .with_body(json!({"errorMessage": "Invalid username or password"}).to_string())
        .create_async()
        .await;

    let test = TestApp::new(&api_base(&server), "http://console.test/");
    test.app.orchestrator.mount().await;

    let feedback = test.app.orchestrator.login("thu", "wrong").await.unwrap_err();
    assert_eq!(feedback.message, "Invalid username or password");
    assert!(!feedback.has_field_errors());
}

#[tokio::test]
async fn test_unwritable_session_file_keeps_caller_signed_out() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/auth/login")
        .with_status(200)
        .with_body(grant_body("a1", "r1", "USER"))
        .create_async()
        .await;

    let scratch = tempfile::tempdir().unwrap();
    let blocker = scratch.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();

    let test = TestApp::with_config(&api_base(&server), "http://console.test/", |config| {
        config.session_file = Some(blocker.join("session.json"));
    });
    let orchestrator = &test.app.orchestrator;
    orchestrator.mount().await;

    let feedback = orchestrator.login("thu", "secret1").await.unwrap_err();
    assert_eq!(feedback.message, LOGIN_FAILED_MESSAGE);
    assert_eq!(orchestrator.state().await, RenderState::Unauthenticated);

    assert_eq!(orchestrator.location_changed().await, RenderState::Unauthenticated);
    assert!(!test.app.store.is_authenticated());
}

#[tokio::test]
async fn test_login_against_unreachable_server_uses_generic_message() {
    let test = TestApp::new(UNREACHABLE_API, "http://console.test/");
    test.app.orchestrator.mount().await;

    let feedback = test.app.orchestrator.login("thu", "secret1").await.unwrap_err();
    assert_eq!(feedback.message, LOGIN_FAILED_MESSAGE);
}

#[tokio::test]
async fn test_logout_clears_local_session_when_server_unreachable() {
    let test = TestApp::seeded(
        UNREACHABLE_API,
        "http://console.test/",
        json!({"accessToken": "a0", "refreshToken": "r0"}),
    );
    assert_eq!(test.app.orchestrator.mount().await, RenderState::Authenticated);

    assert_eq!(test.app.orchestrator.logout().await, RenderState::Unauthenticated);
    assert!(test.stored().is_empty());
    assert!(test.notices().contains(&Notice::success(LOGOUT_SUCCESS_MESSAGE)));
}

#[tokio::test]
async fn test_logout_revokes_refresh_token_with_bearer() {
    let mut server = mockito::Server::new_async().await;
    let logout = server
        .mock("POST", "/api/auth/logout")
        .match_header("authorization", "Bearer a0")
        .match_body(Matcher::Json(json!({"refreshToken": "r0"})))
        .with_status(200)
        .with_body(json!({"message": "Logged out"}).to_string())
        .create_async()
        .await;

    let test = TestApp::seeded(
        &api_base(&server),
        "http://console.test/",
        json!({"accessToken": "a0", "refreshToken": "r0"}),
    );
    test.app.orchestrator.mount().await;

    assert_eq!(test.app.orchestrator.logout().await, RenderState::Unauthenticated);
    logout.assert_async().await;
    assert!(test.stored().is_empty());
}

#[tokio::test]
async fn test_registration_leaves_caller_signed_out_by_default() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/auth/register")
        .match_body(Matcher::PartialJson(json!({"fullName": "Thu Nguyen"})))
        .with_status(201)
        .with_body(json!({"message": "User registered successfully"}).to_string())
        .create_async()
        .await;
    let login = server
        .mock("POST", "/api/auth/login")
        .expect(0)
        .create_async()
        .await;

    let test = TestApp::new(&api_base(&server), "http://console.test/");
    test.app.orchestrator.mount().await;

    let outcome = test.app.orchestrator.register(registration()).await.unwrap();
    assert!(!outcome.signed_in);
    assert_eq!(outcome.message, "User registered successfully");
    assert_eq!(test.app.orchestrator.state().await, RenderState::Unauthenticated);
    login.assert_async().await;
}

#[tokio::test]
async fn test_auto_login_policy_signs_in_after_registration() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/auth/register")
        .with_status(201)
        .with_body(json!({"message": "User registered successfully"}).to_string())
        .create_async()
        .await;
    server
        .mock("POST", "/api/auth/login")
        .with_status(200)
        .with_body(grant_body("a1", "r1", "USER"))
        .create_async()
        .await;

    let test = TestApp::with_config(&api_base(&server), "http://console.test/", |config| {
        config.registration_policy = RegistrationPolicy::AutoLogin;
    });
    test.app.orchestrator.mount().await;

    let outcome = test.app.orchestrator.register(registration()).await.unwrap();
    assert!(outcome.signed_in);
    assert_eq!(test.app.orchestrator.state().await, RenderState::Authenticated);
    assert_eq!(test.stored()["accessToken"], "a1");
}

#[tokio::test]
async fn test_duplicate_registration_is_reported() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/auth/register")
        .with_status(409)
        .with_body(json!({"errorMessage": "Username is already taken"}).to_string())
        .create_async()
        .await;

    let test = TestApp::new(&api_base(&server), "http://console.test/");
    let feedback = test.app.orchestrator.register(registration()).await.unwrap_err();
    assert_eq!(feedback.message, "Username is already taken");
}

#[tokio::test]
async fn test_google_login_redirects_to_provider() {
    let mut server = mockito::Server::new_async().await;
    let provider = "https://accounts.google.com/o/oauth2/v2/auth?client_id=grading&state=xyz";
    server
        .mock("GET", "/api/auth/oauth2/login-url")
        .with_status(200)
        .with_body(json!({"loginUrl": provider}).to_string())
        .create_async()
        .await;

    let test = TestApp::new(&api_base(&server), "http://console.test/");
    let url = test.app.orchestrator.initiate_google_login().await.unwrap();

    assert_eq!(url, provider);
    assert_eq!(test.navigator.redirects(), vec![provider.to_string()]);
}

#[tokio::test]
async fn test_password_reset_flow() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/auth/forgot-password")
        .match_body(Matcher::Json(json!({"email": "thu@example.edu"})))
        .with_status(200)
        .with_body(json!({"message": "Password reset email sent"}).to_string())
        .create_async()
        .await;
    server
        .mock("PUT", "/api/auth/reset-password")
        .match_body(Matcher::Json(json!({"token": "t-1", "newPassword": "secret2"})))
        .with_status(200)
        .with_body(json!({"message": "Password has been reset"}).to_string())
        .create_async()
        .await;
    server
        .mock("GET", "/api/auth/register/verify")
        .match_query(Matcher::UrlEncoded("token".into(), "v+1/2".into()))
        .with_status(200)
        .with_body(json!({"message": "Email verified"}).to_string())
        .create_async()
        .await;

    let test = TestApp::new(&api_base(&server), "http://console.test/");
    let orchestrator = &test.app.orchestrator;

    assert_eq!(
        orchestrator.forgot_password("thu@example.edu").await.unwrap(),
        "Password reset email sent"
    );
    assert_eq!(
        orchestrator.reset_password("t-1", "secret2").await.unwrap(),
        "Password has been reset"
    );
    assert_eq!(orchestrator.verify_registration("v+1/2").await.unwrap(), "Email verified");
    assert!(test.notices().contains(&Notice::success("Email verified")));
}
