use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{AuthError, AuthResult};
use crate::session::backend::{MemoryStorage, StorageBackend};
use crate::session::{Session, UserRecord, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};

/// The persisted session: access token, refresh token and cached user.
///
/// The entries are an advisory cache of what the grading API issued; the API
/// stays authoritative. Cloning shares the same backend.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn StorageBackend>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// A store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    pub fn access_token(&self) -> AuthResult<Option<String>> {
        self.backend.get_item(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> AuthResult<Option<String>> {
        self.backend.get_item(REFRESH_TOKEN_KEY)
    }

    /// The cached user, or `None` when absent, unreadable or malformed
    pub fn current_user(&self) -> Option<UserRecord> {
        let raw = match self.backend.get_item(USER_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read cached user");
                return None;
            }
        };

        match serde_json::from_str::<UserRecord>(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Cached user record is malformed, ignoring it");
                None
            }
        }
    }

    /// Overwrite all three entries with `session`. Absent fields are removed.
    pub fn save(&self, session: &Session) -> AuthResult<()> {
        let mut entries: Vec<(&str, String)> = Vec::with_capacity(3);
        let mut removals: Vec<&str> = Vec::new();

        match &session.refresh_token {
            Some(token) => entries.push((REFRESH_TOKEN_KEY, token.clone())),
            None => removals.push(REFRESH_TOKEN_KEY),
        }
        match &session.user {
            Some(user) => {
                let json = serde_json::to_string(user)
                    .map_err(|e| AuthError::Storage(format!("failed to serialize user: {}", e)))?;
                entries.push((USER_KEY, json));
            }
            None => removals.push(USER_KEY),
        }
        match &session.access_token {
            Some(token) => entries.push((ACCESS_TOKEN_KEY, token.clone())),
            None => removals.push(ACCESS_TOKEN_KEY),
        }

        self.backend.set_items(&entries)?;
        if !removals.is_empty() {
            self.backend.remove_items(&removals)?;
        }

        info!(
            has_access_token = session.access_token.is_some(),
            has_refresh_token = session.refresh_token.is_some(),
            user = session.user.as_ref().map(|u| u.username.as_str()).unwrap_or(""),
            "Session saved"
        );
        Ok(())
    }

    /// Store a token pair that arrived without a user record
    pub fn save_tokens(&self, access_token: &str, refresh_token: &str) -> AuthResult<()> {
        self.save(&Session::new(
            access_token.to_string(),
            refresh_token.to_string(),
            None,
        ))
    }

    /// Remove every session entry. Safe to call repeatedly.
    pub fn clear(&self) -> AuthResult<()> {
        self.backend
            .remove_items(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY])?;
        debug!("Session cleared");
        Ok(())
    }

    pub fn snapshot(&self) -> AuthResult<Session> {
        Ok(Session {
            access_token: self.access_token()?,
            refresh_token: self.refresh_token()?,
            user: self.current_user(),
        })
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.access_token(), Ok(Some(_)))
    }

    pub fn is_admin(&self) -> bool {
        self.current_user().is_some_and(|user| user.is_admin())
    }
}
