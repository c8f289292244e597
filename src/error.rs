use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Fallback message when a failure carries nothing a user can act on
pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Field name to message, as returned in `validationErrors`
pub type FieldErrors = BTreeMap<String, String>;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ValidationFailed,
    ApiRequestFailed,
    NetworkFailure,
    ResponseDecodeFailed,
    StorageFailed,
    ConfigInvalid,
}

/// Broad category of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Authentication,
    Network,
    Internal,
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "Validation"),
            ErrorCategory::Authentication => write!(f, "Authentication"),
            ErrorCategory::Network => write!(f, "Network"),
            ErrorCategory::Internal => write!(f, "Internal"),
            ErrorCategory::Configuration => write!(f, "Configuration"),
        }
    }
}

/// Every failure the client can produce
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    /// The server rejected the request with per-field messages
    #[error("{message}")]
    Validation {
        message: String,
        field_errors: FieldErrors,
        status: u16,
    },

    /// The server answered with a non-success status
    #[error("{message}")]
    Api { message: String, status: u16 },

    /// The request never produced an HTTP response
    #[error("Network error: {0}")]
    Network(String),

    /// A success response whose body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Reading or writing persisted session entries failed
    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    Config { key: String, reason: String },
}

impl AuthError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AuthError::Validation { .. } => ErrorCode::ValidationFailed,
            AuthError::Api { .. } => ErrorCode::ApiRequestFailed,
            AuthError::Network(_) => ErrorCode::NetworkFailure,
            AuthError::Decode(_) => ErrorCode::ResponseDecodeFailed,
            AuthError::Storage(_) => ErrorCode::StorageFailed,
            AuthError::Config { .. } => ErrorCode::ConfigInvalid,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AuthError::Validation { .. } => ErrorCategory::Validation,
            AuthError::Api { status, .. } if *status == 401 || *status == 403 => {
                ErrorCategory::Authentication
            }
            AuthError::Api { .. } => ErrorCategory::Internal,
            AuthError::Network(_) => ErrorCategory::Network,
            AuthError::Decode(_) | AuthError::Storage(_) => ErrorCategory::Internal,
            AuthError::Config { .. } => ErrorCategory::Configuration,
        }
    }

    /// HTTP status, when the failure came from a server response
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::Validation { status, .. } | AuthError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Build the error for a non-success response from its status and raw body.
    ///
    /// Recognizes the server's `ValidationErrorResponse` and `ErrorResponse`
    /// shapes; bodies that are not JSON or match neither shape fall back to a
    /// message built from the status code.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
        let error_message = non_empty_str(&parsed, "errorMessage");

        if let Some(Value::Object(fields)) = parsed.get("validationErrors") {
            let field_errors: FieldErrors = fields
                .iter()
                .map(|(field, message)| {
                    let message = match message {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    };
                    (field.clone(), message)
                })
                .collect();

            return AuthError::Validation {
                message: error_message.unwrap_or_else(|| "Validation failed".to_string()),
                field_errors,
                status,
            };
        }

        let message = error_message
            .or_else(|| non_empty_str(&parsed, "message"))
            .unwrap_or_else(|| format!("HTTP error! status: {}", status));

        AuthError::Api { message, status }
    }
}

fn non_empty_str(body: &Value, key: &str) -> Option<String> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Network(err.to_string())
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

/// What the UI shows for a failed action: inline field messages and one notice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub message: String,
    pub field_errors: FieldErrors,
}

impl Feedback {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field_errors: FieldErrors::new(),
        }
    }

    /// Normalize any client error into UI feedback
    pub fn from_error(err: &AuthError) -> Self {
        match err {
            AuthError::Validation {
                message,
                field_errors,
                ..
            } => Self {
                message: if message.is_empty() {
                    "Validation failed".to_string()
                } else {
                    message.clone()
                },
                field_errors: field_errors.clone(),
            },
            AuthError::Api { message, .. } if !message.is_empty() => Self::message(message.clone()),
            _ => Self::message(UNEXPECTED_ERROR_MESSAGE),
        }
    }

    /// Like `from_error`, but with a form-specific message when no field is to blame
    pub fn for_form(err: &AuthError, fallback: &str) -> Self {
        let mut feedback = Self::from_error(err);
        if feedback.field_errors.is_empty() && feedback.message == UNEXPECTED_ERROR_MESSAGE {
            feedback.message = fallback.to_string();
        }
        feedback
    }

    pub fn has_field_errors(&self) -> bool {
        !self.field_errors.is_empty()
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        for (field, message) in &self.field_errors {
            write!(f, "\n  {}: {}", field, message)?;
        }
        Ok(())
    }
}
