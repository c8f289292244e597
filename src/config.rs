use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AuthError, AuthResult};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_CALLBACK_PATH: &str = "/oauth2/callback";
pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_SITE_ROOT: &str = "/";

const API_URL_ENV: &str = "GRADING_API_URL";
const CALLBACK_PATH_ENV: &str = "GRADING_CALLBACK_PATH";
const LOGIN_PATH_ENV: &str = "GRADING_LOGIN_PATH";
const SITE_ROOT_ENV: &str = "GRADING_SITE_ROOT";
const SESSION_FILE_ENV: &str = "GRADING_SESSION_FILE";
const REQUEST_TIMEOUT_ENV: &str = "GRADING_REQUEST_TIMEOUT_SECS";
const REGISTRATION_POLICY_ENV: &str = "GRADING_REGISTRATION_POLICY";

/// What happens after a successful registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationPolicy {
    /// The user verifies their email and signs in separately
    #[default]
    RequireLogin,
    /// Sign in immediately with the credentials just registered
    AutoLogin,
}

impl FromStr for RegistrationPolicy {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "require_login" => Ok(RegistrationPolicy::RequireLogin),
            "auto_login" => Ok(RegistrationPolicy::AutoLogin),
            _ => Err(AuthError::Config {
                key: REGISTRATION_POLICY_ENV.to_string(),
                reason: format!("expected 'require_login' or 'auto_login', got '{}'", s),
            }),
        }
    }
}

impl fmt::Display for RegistrationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationPolicy::RequireLogin => write!(f, "require_login"),
            RegistrationPolicy::AutoLogin => write!(f, "auto_login"),
        }
    }
}

/// Configuration for the grading client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Root of the grading API, without a trailing slash
    pub api_base_url: String,
    /// Path the identity provider redirects back to
    pub callback_path: String,
    /// Login page; the API also sends sign-in failures here as `?error=`
    pub login_path: String,
    /// Where the visible URL is reset to after a callback
    pub site_root: String,
    /// Session file; `None` keeps the session in memory
    pub session_file: Option<PathBuf>,
    /// Per-request timeout; `None` waits as long as the server does
    pub request_timeout_secs: Option<u64>,
    pub registration_policy: RegistrationPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            callback_path: DEFAULT_CALLBACK_PATH.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            site_root: DEFAULT_SITE_ROOT.to_string(),
            session_file: None,
            request_timeout_secs: None,
            registration_policy: RegistrationPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `GRADING_*` environment variables
    pub fn from_env() -> AuthResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AuthResult<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = get(API_URL_ENV) {
            config.api_base_url = url;
        }
        if let Some(path) = get(CALLBACK_PATH_ENV) {
            config.callback_path = path;
        }
        if let Some(path) = get(LOGIN_PATH_ENV) {
            config.login_path = path;
        }
        if let Some(root) = get(SITE_ROOT_ENV) {
            config.site_root = root;
        }
        if let Some(file) = get(SESSION_FILE_ENV) {
            config.session_file = Some(PathBuf::from(file));
        }
        if let Some(secs) = get(REQUEST_TIMEOUT_ENV) {
            let secs = secs.trim().parse::<u64>().map_err(|e| AuthError::Config {
                key: REQUEST_TIMEOUT_ENV.to_string(),
                reason: e.to_string(),
            })?;
            config.request_timeout_secs = Some(secs);
        }
        if let Some(policy) = get(REGISTRATION_POLICY_ENV) {
            config.registration_policy = policy.parse()?;
        }

        config.validate()?;
        debug!(?config, "Client configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> AuthResult<()> {
        url::Url::parse(&self.api_base_url).map_err(|e| AuthError::Config {
            key: API_URL_ENV.to_string(),
            reason: e.to_string(),
        })?;

        if !self.callback_path.starts_with('/') {
            return Err(AuthError::Config {
                key: CALLBACK_PATH_ENV.to_string(),
                reason: "must start with '/'".to_string(),
            });
        }
        if !self.login_path.starts_with('/') {
            return Err(AuthError::Config {
                key: LOGIN_PATH_ENV.to_string(),
                reason: "must start with '/'".to_string(),
            });
        }
        if !self.site_root.starts_with('/') {
            return Err(AuthError::Config {
                key: SITE_ROOT_ENV.to_string(),
                reason: "must start with '/'".to_string(),
            });
        }
        if self.request_timeout_secs == Some(0) {
            return Err(AuthError::Config {
                key: REQUEST_TIMEOUT_ENV.to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
