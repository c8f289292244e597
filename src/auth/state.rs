use std::fmt;

use serde::{Deserialize, Serialize};

/// The mutually exclusive UI mode of the console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderState {
    /// Startup checks have not finished yet
    InitialLoading,
    /// The identity provider redirected back and the callback is being handled
    OAuth2Callback,
    Authenticated,
    Unauthenticated,
}

impl RenderState {
    /// Whether this state is one the startup sequence can end in
    pub fn is_settled(&self) -> bool {
        matches!(self, RenderState::Authenticated | RenderState::Unauthenticated)
    }
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderState::InitialLoading => write!(f, "initial-loading"),
            RenderState::OAuth2Callback => write!(f, "oauth2-callback"),
            RenderState::Authenticated => write!(f, "authenticated"),
            RenderState::Unauthenticated => write!(f, "unauthenticated"),
        }
    }
}

/// Next step of the startup sequence, decided from what is known locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupStep {
    /// The URL carries callback parameters; hand over to callback handling
    HandleCallback,
    /// A refresh is owed before the caller can count as signed in
    Refresh { refresh_token: String },
    /// Nothing else to do
    Settle(RenderState),
}

/// Decide the startup step. Callback parameters win over stored tokens,
/// and a stored access token wins over a refresh token.
pub fn plan_startup(
    on_callback: bool,
    access_token: Option<&str>,
    refresh_token: Option<&str>,
) -> StartupStep {
    if on_callback {
        return StartupStep::HandleCallback;
    }
    if access_token.is_some() {
        return StartupStep::Settle(RenderState::Authenticated);
    }
    match refresh_token {
        Some(token) => StartupStep::Refresh {
            refresh_token: token.to_string(),
        },
        None => StartupStep::Settle(RenderState::Unauthenticated),
    }
}

/// Where a refresh attempt leaves the caller
pub fn after_refresh(succeeded: bool) -> RenderState {
    if succeeded {
        RenderState::Authenticated
    } else {
        RenderState::Unauthenticated
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A toast-style message for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Events published by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthEvent {
    StateChanged {
        from: RenderState,
        to: RenderState,
    },
    Notice(Notice),
}
