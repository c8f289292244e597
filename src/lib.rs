use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

// Export modules
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod http_client;
pub mod routes;
pub mod session;

pub use api::{AuthApi, LoginRequest, RegisterRequest, TokenGrant};
pub use auth::{AuthEvent, AuthOrchestrator, Navigator, Notice, RenderState};
pub use config::{ClientConfig, RegistrationPolicy};
pub use error::{AuthError, AuthResult, ErrorCategory, ErrorCode, Feedback};
pub use http_client::{HttpClient, ReqwestHttpClient};
pub use routes::{Route, RouteDecision};
pub use session::{FileStorage, MemoryStorage, Session, SessionStore, StorageBackend, UserRecord};

/// Main application state
pub struct AppState {
    /// Configuration the state was built from
    pub config: ClientConfig,
    /// Persisted session entries
    pub store: SessionStore,
    /// Client for the `/auth` endpoints
    pub api: AuthApi,
    /// Root auth controller
    pub orchestrator: Arc<AuthOrchestrator>,
}

impl AppState {
    /// Build the state from configuration, using reqwest for HTTP and the
    /// configured session file (or memory) for storage
    pub fn new(config: ClientConfig, navigator: Arc<dyn Navigator>) -> AuthResult<Self> {
        config.validate()?;

        let backend: Arc<dyn StorageBackend> = match &config.session_file {
            Some(path) => {
                debug!(path = %path.display(), "Using file session storage");
                Arc::new(FileStorage::open(path)?)
            }
            None => {
                debug!("Using in-memory session storage");
                Arc::new(MemoryStorage::new())
            }
        };

        let http: Arc<dyn HttpClient> = match config.request_timeout_secs {
            Some(secs) => Arc::new(ReqwestHttpClient::with_timeout(Duration::from_secs(secs))?),
            None => Arc::new(ReqwestHttpClient::new()),
        };

        Ok(Self::with_parts(config, backend, http, navigator))
    }

    /// Build the state from explicit collaborators
    pub fn with_parts(
        config: ClientConfig,
        backend: Arc<dyn StorageBackend>,
        http: Arc<dyn HttpClient>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let store = SessionStore::new(backend);
        let api = AuthApi::new(config.api_base_url.clone(), http, store.clone());
        let orchestrator = Arc::new(AuthOrchestrator::new(
            api.clone(),
            store.clone(),
            navigator,
            &config,
        ));

        info!(
            api = %config.api_base_url,
            policy = %config.registration_policy,
            "Grading client ready"
        );

        Self {
            config,
            store,
            api,
            orchestrator,
        }
    }
}
