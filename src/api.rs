//! Typed access to the grading API's `/auth` endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AuthError, AuthResult};
use crate::http_client::{HttpClient, HttpMethod, SimpleHttpResponse};
use crate::session::{Session, SessionStore, UserRecord};

const LOGIN_PATH: &str = "/auth/login";
const REGISTER_PATH: &str = "/auth/register";
const VERIFY_REGISTRATION_PATH: &str = "/auth/register/verify";
const REFRESH_PATH: &str = "/auth/refresh";
const LOGOUT_PATH: &str = "/auth/logout";
const OAUTH2_LOGIN_URL_PATH: &str = "/auth/oauth2/login-url";
const FORGOT_PASSWORD_PATH: &str = "/auth/forgot-password";
const RESET_PASSWORD_PATH: &str = "/auth/reset-password";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokenRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct ForgotPasswordRequest<'a> {
    email: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetPasswordRequest<'a> {
    token: &'a str,
    new_password: &'a str,
}

/// Tokens issued by login and refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: String,
    /// Lifetime of the access token in seconds
    #[serde(default)]
    pub expires_in: u64,
    pub user: UserRecord,
}

impl TokenGrant {
    /// When the access token lapses, counted from `issued_at`
    pub fn expires_at(&self, issued_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.expires_in == 0 {
            return None;
        }
        let lifetime = i64::try_from(self.expires_in).ok()?;
        issued_at.checked_add_signed(Duration::seconds(lifetime))
    }

    pub fn into_session(self) -> Session {
        Session::new(self.access_token, self.refresh_token, Some(self.user))
    }
}

/// `{message}` replies from register, verify and password endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginUrlResponse {
    login_url: String,
}

/// Client for the authentication endpoints
#[derive(Clone)]
pub struct AuthApi {
    base_url: String,
    http: Arc<dyn HttpClient>,
    store: SessionStore,
}

impl AuthApi {
    /// `base_url` is the API root, e.g. `http://localhost:8080/api`
    pub fn new(base_url: impl Into<String>, http: Arc<dyn HttpClient>, store: SessionStore) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            store,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn login(&self, request: &LoginRequest) -> AuthResult<TokenGrant> {
        self.send(HttpMethod::POST, LOGIN_PATH, Some(request)).await
    }

    pub async fn register(&self, request: &RegisterRequest) -> AuthResult<MessageResponse> {
        self.send(HttpMethod::POST, REGISTER_PATH, Some(request)).await
    }

    pub async fn verify_registration(&self, token: &str) -> AuthResult<MessageResponse> {
        let path = format!("{}?token={}", VERIFY_REGISTRATION_PATH, encode_query_value(token));
        self.send::<(), _>(HttpMethod::GET, &path, None).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenGrant> {
        let body = RefreshTokenRequest { refresh_token };
        self.send(HttpMethod::POST, REFRESH_PATH, Some(&body)).await
    }

    /// Revoke `refresh_token` on the server. Any success body is ignored.
    pub async fn logout(&self, refresh_token: &str) -> AuthResult<()> {
        let body = RefreshTokenRequest { refresh_token };
        self.exchange(HttpMethod::POST, LOGOUT_PATH, Some(&body)).await?;
        Ok(())
    }

    /// Where to send the browser to start Google sign-in
    pub async fn oauth2_login_url(&self) -> AuthResult<String> {
        let response: LoginUrlResponse = self
            .send::<(), _>(HttpMethod::GET, OAUTH2_LOGIN_URL_PATH, None)
            .await?;
        Ok(response.login_url)
    }

    pub async fn forgot_password(&self, email: &str) -> AuthResult<MessageResponse> {
        let body = ForgotPasswordRequest { email };
        self.send(HttpMethod::POST, FORGOT_PASSWORD_PATH, Some(&body)).await
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> AuthResult<MessageResponse> {
        let body = ResetPasswordRequest { token, new_password };
        self.send(HttpMethod::PUT, RESET_PASSWORD_PATH, Some(&body)).await
    }

    async fn send<B: Serialize, T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
    ) -> AuthResult<T> {
        self.exchange(method, path, body).await?.json()
    }

    async fn exchange<B: Serialize>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
    ) -> AuthResult<SimpleHttpResponse> {
        let url = self.endpoint(path);
        let headers = self.headers();

        let response = match method {
            HttpMethod::GET => self.http.get(&url, headers).await,
            HttpMethod::POST => self.http.post(&url, headers, encode_body(body)?).await,
            HttpMethod::PUT => self.http.put(&url, headers, encode_body(body)?).await,
        }
        .map_err(|e| {
            warn!(method = ?method, path = %path, error = %e, "API request failed");
            e
        })?;

        debug!(method = ?method, path = %path, status = response.status(), "API response");

        if !response.is_success() {
            return Err(AuthError::from_response(response.status(), response.body()));
        }
        Ok(response)
    }

    fn headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Accept".to_string(), "application/json".to_string());

        if let Ok(Some(token)) = self.store.access_token() {
            headers.insert("Authorization".to_string(), format!("Bearer {}", token));
        }
        headers
    }
}

fn encode_body<B: Serialize>(body: Option<&B>) -> AuthResult<String> {
    match body {
        Some(body) => serde_json::to_string(body)
            .map_err(|e| AuthError::Decode(format!("failed to encode request body: {}", e))),
        None => Ok("{}".to_string()),
    }
}

fn encode_query_value(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
