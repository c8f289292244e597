//! Parsing of the identity provider's redirect back to the console.

use url::Url;

const ACCESS_TOKEN_PARAM: &str = "accessToken";
const REFRESH_TOKEN_PARAM: &str = "refreshToken";
const ERROR_PARAM: &str = "error";

pub const SESSION_EXPIRED_MESSAGE: &str =
    "Your Google sign-in session has expired. Please try signing in again.";
pub const ACCESS_DENIED_MESSAGE: &str = "Google sign-in was cancelled. Please try again.";
pub const GOOGLE_LOGIN_FAILED_MESSAGE: &str = "Google sign-in failed. Please try again.";
pub const INVALID_CALLBACK_MESSAGE: &str = "Invalid authentication response. Please try again.";
pub const GOOGLE_LOGIN_SUCCESS_MESSAGE: &str = "Signed in with Google!";

/// Query parameters carried by a callback URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    pub fn from_url(url: &Url) -> Self {
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                ACCESS_TOKEN_PARAM => params.access_token = Some(value.into_owned()),
                REFRESH_TOKEN_PARAM => params.refresh_token = Some(value.into_owned()),
                ERROR_PARAM => params.error = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.error.is_none()
    }

    /// Classify the callback. An error wins over tokens; both tokens are required.
    pub fn outcome(self) -> CallbackOutcome {
        if let Some(error) = self.error {
            return CallbackOutcome::Failed(OAuthFailure::classify(&error));
        }
        match (self.access_token, self.refresh_token) {
            (Some(access_token), Some(refresh_token))
                if !access_token.is_empty() && !refresh_token.is_empty() =>
            {
                CallbackOutcome::Tokens {
                    access_token,
                    refresh_token,
                }
            }
            _ => CallbackOutcome::Invalid,
        }
    }
}

/// Whether `url` is a callback: the callback path carrying any callback
/// parameter, or the login page carrying the `error` the API redirects failures with
pub fn is_callback(url: &Url, callback_path: &str, login_path: &str) -> bool {
    let path = url.path();
    if path == callback_path {
        return !CallbackParams::from_url(url).is_empty();
    }
    path == login_path && CallbackParams::from_url(url).error.is_some()
}

/// `url` with its path reset to `site_root` and nothing that could carry a token
pub fn scrubbed(url: &Url, site_root: &str) -> Url {
    let mut clean = url.clone();
    clean.set_path(site_root);
    clean.set_query(None);
    clean.set_fragment(None);
    clean
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Tokens {
        access_token: String,
        refresh_token: String,
    },
    Failed(OAuthFailure),
    /// Neither tokens nor an error
    Invalid,
}

/// Known reasons the identity provider sends back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthFailure {
    /// The authorization request could not be matched, usually because it expired
    SessionExpired,
    /// The user declined consent
    AccessDenied,
    Other,
}

impl OAuthFailure {
    pub fn classify(error: &str) -> Self {
        if error.contains("authorization_request_not_found") {
            OAuthFailure::SessionExpired
        } else if error.contains("access_denied") {
            OAuthFailure::AccessDenied
        } else {
            OAuthFailure::Other
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            OAuthFailure::SessionExpired => SESSION_EXPIRED_MESSAGE,
            OAuthFailure::AccessDenied => ACCESS_DENIED_MESSAGE,
            OAuthFailure::Other => GOOGLE_LOGIN_FAILED_MESSAGE,
        }
    }
}
