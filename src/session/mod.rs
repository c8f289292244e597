pub mod backend;
pub mod store;

use serde::{Deserialize, Serialize};

pub use backend::{FileStorage, MemoryStorage, StorageBackend};
pub use store::SessionStore;

/// Storage key of the access token
pub const ACCESS_TOKEN_KEY: &str = "accessToken";
/// Storage key of the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
/// Storage key of the serialized user record
pub const USER_KEY: &str = "user";

/// Role string that unlocks the admin pages
pub const ADMIN_ROLE: &str = "ADMIN";

/// The signed-in user as reported by the grading API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: i64,
    #[serde(default)]
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

impl UserRecord {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

/// Client-side view of the credentials currently held
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<UserRecord>,
}

impl Session {
    pub fn new(access_token: String, refresh_token: String, user: Option<UserRecord>) -> Self {
        Self {
            access_token: Some(access_token),
            refresh_token: Some(refresh_token),
            user,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.user.is_none()
    }
}
