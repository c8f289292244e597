//! Integration test harness for the grading client
//! Builds an `AppState` backed by a temporary session file and a mock API server

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tempfile::TempDir;

use grading_lib::auth::{AuthEvent, MemoryNavigator, Notice};
use grading_lib::{AppState, ClientConfig};

/// Address nothing listens on, for transport failures
pub const UNREACHABLE_API: &str = "http://127.0.0.1:1/api";

/// A fully wired client plus the handles tests inspect
pub struct TestApp {
    pub app: AppState,
    pub navigator: Arc<MemoryNavigator>,
    pub session_path: PathBuf,
    _dir: TempDir,
}

impl TestApp {
    /// Client for `api_base_url` whose browser is at `location`
    pub fn new(api_base_url: &str, location: &str) -> Self {
        Self::build(api_base_url, location, |_| {}, None)
    }

    /// Client with the session file pre-populated with `entries`
    pub fn seeded(api_base_url: &str, location: &str, entries: Value) -> Self {
        Self::build(api_base_url, location, |_| {}, Some(entries))
    }

    pub fn with_config(
        api_base_url: &str,
        location: &str,
        customize: impl FnOnce(&mut ClientConfig),
    ) -> Self {
        Self::build(api_base_url, location, customize, None)
    }

    fn build(
        api_base_url: &str,
        location: &str,
        customize: impl FnOnce(&mut ClientConfig),
        entries: Option<Value>,
    ) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let session_path = dir.path().join("session.json");
        if let Some(entries) = entries {
            fs::write(&session_path, entries.to_string()).expect("Failed to seed session file");
        }

        let mut config = ClientConfig {
            api_base_url: api_base_url.to_string(),
            session_file: Some(session_path.clone()),
            request_timeout_secs: Some(5),
            ..ClientConfig::default()
        };
        customize(&mut config);

        let navigator = Arc::new(MemoryNavigator::parse(location).expect("Invalid location"));
        let app = AppState::new(config, navigator.clone()).expect("Failed to build app state");

        Self {
            app,
            navigator,
            session_path,
            _dir: dir,
        }
    }

    /// Entries currently persisted in the session file
    pub fn stored(&self) -> Map<String, Value> {
        read_session_file(&self.session_path)
    }

    /// A second client over the same session file, as after a page reload
    pub fn reopen(&self, api_base_url: &str, location: &str) -> AppState {
        let config = ClientConfig {
            api_base_url: api_base_url.to_string(),
            session_file: Some(self.session_path.clone()),
            ..ClientConfig::default()
        };
        let navigator = Arc::new(MemoryNavigator::parse(location).expect("Invalid location"));
        AppState::new(config, navigator).expect("Failed to reopen app state")
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.app
            .orchestrator
            .recent_events()
            .into_iter()
            .filter_map(|event| match event {
                AuthEvent::Notice(notice) => Some(notice),
                _ => None,
            })
            .collect()
    }
}

pub fn read_session_file(path: &Path) -> Map<String, Value> {
    match fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).expect("Session file is not JSON"),
        Err(_) => Map::new(),
    }
}

/// `/api` root on a mockito server
pub fn api_base(server: &mockito::ServerGuard) -> String {
    format!("{}/api", server.url())
}

/// Body of a login or refresh response
pub fn grant_body(access_token: &str, refresh_token: &str, role: &str) -> String {
    json!({
        "accessToken": access_token,
        "refreshToken": refresh_token,
        "tokenType": "Bearer",
        "expiresIn": 900,
        "user": {
            "id": 42,
            "username": "thu",
            "email": "thu@example.edu",
            "fullName": "Thu Nguyen",
            "role": role,
            "isActive": true
        }
    })
    .to_string()
}
