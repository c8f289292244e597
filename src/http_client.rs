use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::{AuthError, AuthResult};

/// HTTP method enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
}

/// Status and body of a completed HTTP exchange
#[derive(Debug, Clone)]
pub struct SimpleHttpResponse {
    status_code: u16,
    body: String,
}

impl SimpleHttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status_code: status,
            body: body.into(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status_code
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Parse body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> AuthResult<T> {
        serde_json::from_str(&self.body).map_err(|e| AuthError::Decode(e.to_string()))
    }

    /// Check if successful (2xx status)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Trait for HTTP client operations, allowing for mocking
///
/// Implementations return `Ok` for any response the server produced,
/// whatever its status; `Err` means the exchange itself failed.
#[async_trait::async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str, headers: HashMap<String, String>) -> AuthResult<SimpleHttpResponse>;

    async fn post(
        &self,
        url: &str,
        headers: HashMap<String, String>,
        body: String,
    ) -> AuthResult<SimpleHttpResponse>;

    async fn put(
        &self,
        url: &str,
        headers: HashMap<String, String>,
        body: String,
    ) -> AuthResult<SimpleHttpResponse>;
}

/// Implementation of HttpClient using reqwest
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Build a client that gives up on requests after `timeout`
    pub fn with_timeout(timeout: Duration) -> AuthResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn send(
        &self,
        mut request: reqwest::RequestBuilder,
        headers: HashMap<String, String>,
    ) -> AuthResult<SimpleHttpResponse> {
        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(SimpleHttpResponse::new(status, body))
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str, headers: HashMap<String, String>) -> AuthResult<SimpleHttpResponse> {
        self.send(self.client.get(url), headers).await
    }

    async fn post(
        &self,
        url: &str,
        headers: HashMap<String, String>,
        body: String,
    ) -> AuthResult<SimpleHttpResponse> {
        self.send(self.client.post(url).body(body), headers).await
    }

    async fn put(
        &self,
        url: &str,
        headers: HashMap<String, String>,
        body: String,
    ) -> AuthResult<SimpleHttpResponse> {
        self.send(self.client.put(url).body(body), headers).await
    }
}
