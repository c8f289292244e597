use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::api::{AuthApi, LoginRequest, RegisterRequest};
use crate::auth::callback::{
    is_callback, scrubbed, CallbackOutcome, CallbackParams, GOOGLE_LOGIN_SUCCESS_MESSAGE,
    INVALID_CALLBACK_MESSAGE,
};
use crate::auth::navigator::Navigator;
use crate::auth::state::{after_refresh, plan_startup, AuthEvent, Notice, RenderState, StartupStep};
use crate::config::{ClientConfig, RegistrationPolicy};
use crate::error::{AuthError, AuthResult, Feedback};
use crate::events::{EventStream, Subscriber, EVENT_BUFFER_SIZE, EVENT_STREAM_CAPACITY};
use crate::routes::{self, Route, RouteDecision};
use crate::session::{SessionStore, UserRecord};

pub const LOGIN_SUCCESS_MESSAGE: &str = "Login successful!";
pub const LOGIN_FAILED_MESSAGE: &str = "Login failed. Please try again.";
pub const REGISTER_SUCCESS_MESSAGE: &str =
    "Registration successful! Please check your email to verify your account.";
pub const REGISTER_FAILED_MESSAGE: &str = "Registration failed. Please try again.";
pub const LOGOUT_SUCCESS_MESSAGE: &str = "Logout successful!";
pub const GOOGLE_LOGIN_START_FAILED_MESSAGE: &str = "Could not start Google sign-in. Please try again.";
pub const CALLBACK_FAILED_MESSAGE: &str = "Authentication failed. Please try again.";
pub const REQUEST_FAILED_MESSAGE: &str = "Request failed. Please try again.";
/// Returned to callers whose view was unmounted before the response arrived
pub const CANCELLED_MESSAGE: &str = "The request was cancelled.";

/// Result of a successful registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationOutcome {
    /// Message from the server
    pub message: String,
    /// Whether the policy signed the new user in straight away
    pub signed_in: bool,
}

/// Root controller of the console's authentication flow.
///
/// Owns the render state and runs the startup sequence on mount and on every
/// location change. Actions never return raw errors: failures come back as
/// [`Feedback`] and are also published as notices on the event stream.
///
/// Each mount is identified by an epoch. [`AuthOrchestrator::unmount`] moves
/// to a new epoch, and responses that arrive for an older one are dropped
/// without touching the session or the render state.
pub struct AuthOrchestrator {
    api: AuthApi,
    store: SessionStore,
    navigator: Arc<dyn Navigator>,
    callback_path: String,
    login_path: String,
    site_root: String,
    registration_policy: RegistrationPolicy,
    state: RwLock<RenderState>,
    epoch: AtomicU64,
    events: EventStream<AuthEvent>,
}

impl AuthOrchestrator {
    pub fn new(
        api: AuthApi,
        store: SessionStore,
        navigator: Arc<dyn Navigator>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            api,
            store,
            navigator,
            callback_path: config.callback_path.clone(),
            login_path: config.login_path.clone(),
            site_root: config.site_root.clone(),
            registration_policy: config.registration_policy,
            state: RwLock::new(RenderState::InitialLoading),
            epoch: AtomicU64::new(0),
            events: EventStream::new(EVENT_STREAM_CAPACITY, EVENT_BUFFER_SIZE),
        }
    }

    pub async fn state(&self) -> RenderState {
        *self.state.read().await
    }

    pub fn subscribe(&self) -> Subscriber<AuthEvent> {
        self.events.subscribe()
    }

    /// Most recent events, oldest first
    pub fn recent_events(&self) -> Vec<AuthEvent> {
        self.events.recent()
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn current_user(&self) -> Option<UserRecord> {
        self.store.current_user()
    }

    pub fn is_admin(&self) -> bool {
        self.store.is_admin()
    }

    pub fn guard(&self, route: Route) -> RouteDecision {
        routes::guard(route, &self.store)
    }

    /// Run the startup sequence, holding `InitialLoading` until it settles
    pub async fn mount(&self) -> RenderState {
        let epoch = self.current_epoch();
        info!(epoch, "Mounting console");
        self.commit(epoch, RenderState::InitialLoading).await;
        self.resolve(epoch).await
    }

    /// Re-run the startup sequence after the visible location changed
    pub async fn location_changed(&self) -> RenderState {
        let epoch = self.current_epoch();
        debug!(epoch, url = %self.navigator.current_url().path(), "Location changed");
        self.resolve(epoch).await
    }

    /// Tear down the current view; in-flight results for it are discarded
    pub fn unmount(&self) {
        let previous = self.epoch.fetch_add(1, Ordering::SeqCst);
        debug!(epoch = previous, "View unmounted");
    }

    async fn resolve(&self, epoch: u64) -> RenderState {
        let state = match self.evaluate(epoch).await {
            Ok(state) => state,
            Err(e) => {
                error!(error = %e, code = ?e.code(), "Startup check failed, treating caller as signed out");
                RenderState::Unauthenticated
            }
        };
        self.commit(epoch, state).await
    }

    async fn evaluate(&self, epoch: u64) -> AuthResult<RenderState> {
        let url = self.navigator.current_url();
        let on_callback = is_callback(&url, &self.callback_path, &self.login_path);
        let access_token = self.store.access_token()?;
        let refresh_token = self.store.refresh_token()?;

        match plan_startup(on_callback, access_token.as_deref(), refresh_token.as_deref()) {
            StartupStep::HandleCallback => {
                self.commit(epoch, RenderState::OAuth2Callback).await;
                Ok(self.finish_callback(epoch).await)
            }
            StartupStep::Settle(state) => Ok(state),
            StartupStep::Refresh { refresh_token } => self.refresh_session(epoch, &refresh_token).await,
        }
    }

    async fn refresh_session(&self, epoch: u64, refresh_token: &str) -> AuthResult<RenderState> {
        debug!("Access token missing, attempting refresh");

        match self.api.refresh(refresh_token).await {
            Ok(grant) => {
                if !self.is_current(epoch) {
                    debug!(epoch, "Discarding refresh result for unmounted view");
                    return Ok(self.state().await);
                }
                info!(
                    user = %grant.user.username,
                    expires_at = ?grant.expires_at(Utc::now()),
                    "Session refreshed"
                );
                self.store.save(&grant.into_session())?;
                Ok(after_refresh(true))
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, clearing session");
                if self.is_current(epoch) {
                    self.store.clear()?;
                }
                Ok(after_refresh(false))
            }
        }
    }

    /// Handle the identity provider's redirect at the current location
    pub async fn complete_oauth2_callback(&self) -> RenderState {
        let epoch = self.current_epoch();
        self.commit(epoch, RenderState::OAuth2Callback).await;
        self.finish_callback(epoch).await
    }

    async fn finish_callback(&self, epoch: u64) -> RenderState {
        let url = self.navigator.current_url();
        let params = CallbackParams::from_url(&url);
        debug!(
            has_access_token = params.access_token.is_some(),
            has_refresh_token = params.refresh_token.is_some(),
            error = ?params.error,
            "Handling OAuth2 callback"
        );

        let state = if !self.is_current(epoch) {
            debug!(epoch, "Discarding OAuth2 callback for unmounted view");
            self.state().await
        } else {
            match params.outcome() {
                CallbackOutcome::Tokens {
                    access_token,
                    refresh_token,
                } => match self.store.save_tokens(&access_token, &refresh_token) {
                    Ok(()) => {
                        info!("OAuth2 sign-in completed");
                        self.notify(Notice::success(GOOGLE_LOGIN_SUCCESS_MESSAGE));
                        RenderState::Authenticated
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to store OAuth2 tokens");
                        self.fail_callback(CALLBACK_FAILED_MESSAGE)
                    }
                },
                CallbackOutcome::Failed(failure) => {
                    warn!(failure = ?failure, "OAuth2 sign-in failed");
                    self.fail_callback(failure.message())
                }
                CallbackOutcome::Invalid => {
                    warn!("Invalid OAuth2 callback, missing tokens");
                    self.fail_callback(INVALID_CALLBACK_MESSAGE)
                }
            }
        };

        // Tokens must not stay in the address bar or history on any path.
        self.navigator.replace_url(scrubbed(&url, &self.site_root));

        self.commit(epoch, state).await
    }

    fn fail_callback(&self, message: &str) -> RenderState {
        if let Err(e) = self.store.clear() {
            error!(error = %e, "Failed to clear session after OAuth2 failure");
        }
        self.notify(Notice::error(message));
        RenderState::Unauthenticated
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<UserRecord, Feedback> {
        let epoch = self.current_epoch();
        let op_id = Uuid::new_v4();
        info!(%op_id, username, "Logging in");

        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };

        let grant = match self.api.login(&request).await {
            Ok(grant) => grant,
            Err(e) => return Err(self.action_failed(op_id, "login", &e, LOGIN_FAILED_MESSAGE)),
        };

        if !self.is_current(epoch) {
            debug!(%op_id, epoch, "Discarding login result for unmounted view");
            return Err(Feedback::message(CANCELLED_MESSAGE));
        }

        let user = grant.user.clone();
        debug!(%op_id, expires_at = ?grant.expires_at(Utc::now()), "Access token issued");
        if let Err(e) = self.store.save(&grant.into_session()) {
            return Err(self.action_failed(op_id, "login", &e, LOGIN_FAILED_MESSAGE));
        }

        self.commit(epoch, RenderState::Authenticated).await;
        self.notify(Notice::success(LOGIN_SUCCESS_MESSAGE));
        info!(%op_id, user_id = user.id, role = %user.role, "Login successful");
        Ok(user)
    }

    /// Create an account. Whether the caller ends up signed in depends on
    /// the configured [`RegistrationPolicy`].
    pub async fn register(&self, request: RegisterRequest) -> Result<RegistrationOutcome, Feedback> {
        let op_id = Uuid::new_v4();
        info!(%op_id, username = %request.username, policy = %self.registration_policy, "Registering");

        let response = match self.api.register(&request).await {
            Ok(response) => response,
            Err(e) => return Err(self.action_failed(op_id, "register", &e, REGISTER_FAILED_MESSAGE)),
        };
        info!(%op_id, "Registration accepted");

        match self.registration_policy {
            RegistrationPolicy::RequireLogin => {
                self.notify(Notice::success(REGISTER_SUCCESS_MESSAGE));
                Ok(RegistrationOutcome {
                    message: response.message,
                    signed_in: false,
                })
            }
            RegistrationPolicy::AutoLogin => {
                self.notify(Notice::success(response.message.clone()));
                let signed_in = self.login(&request.username, &request.password).await.is_ok();
                Ok(RegistrationOutcome {
                    message: response.message,
                    signed_in,
                })
            }
        }
    }

    /// Sign out. The server is told when possible, but the local session is
    /// cleared and the state ends `Unauthenticated` whatever it answers.
    pub async fn logout(&self) -> RenderState {
        let op_id = Uuid::new_v4();
        info!(%op_id, "Logging out");

        let refresh_token = match self.store.refresh_token() {
            Ok(token) => token,
            Err(e) => {
                warn!(%op_id, error = %e, "Could not read refresh token for logout");
                None
            }
        };

        if let Some(token) = refresh_token {
            if let Err(e) = self.api.logout(&token).await {
                warn!(%op_id, error = %e, "Remote logout failed, clearing local session anyway");
            }
        }

        if let Err(e) = self.store.clear() {
            error!(%op_id, error = %e, "Failed to clear local session");
        }

        self.set_state(RenderState::Unauthenticated).await;
        self.notify(Notice::success(LOGOUT_SUCCESS_MESSAGE));
        RenderState::Unauthenticated
    }

    /// Send the browser to Google's consent page. Returns the URL used.
    pub async fn initiate_google_login(&self) -> Result<String, Feedback> {
        let epoch = self.current_epoch();
        let op_id = Uuid::new_v4();
        info!(%op_id, "Starting Google sign-in");

        let login_url = match self.api.oauth2_login_url().await {
            Ok(url) => url,
            Err(e) => {
                return Err(self.action_failed(op_id, "google_login", &e, GOOGLE_LOGIN_START_FAILED_MESSAGE))
            }
        };

        if !self.is_current(epoch) {
            debug!(%op_id, epoch, "Discarding Google sign-in URL for unmounted view");
            return Err(Feedback::message(CANCELLED_MESSAGE));
        }

        if let Err(e) = self.navigator.redirect(&login_url) {
            return Err(self.action_failed(op_id, "google_login", &e, GOOGLE_LOGIN_START_FAILED_MESSAGE));
        }
        Ok(login_url)
    }

    pub async fn verify_registration(&self, token: &str) -> Result<String, Feedback> {
        let op_id = Uuid::new_v4();
        match self.api.verify_registration(token).await {
            Ok(response) => Ok(self.message_succeeded(response.message)),
            Err(e) => Err(self.action_failed(op_id, "verify_registration", &e, REQUEST_FAILED_MESSAGE)),
        }
    }

    pub async fn forgot_password(&self, email: &str) -> Result<String, Feedback> {
        let op_id = Uuid::new_v4();
        match self.api.forgot_password(email).await {
            Ok(response) => Ok(self.message_succeeded(response.message)),
            Err(e) => Err(self.action_failed(op_id, "forgot_password", &e, REQUEST_FAILED_MESSAGE)),
        }
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<String, Feedback> {
        let op_id = Uuid::new_v4();
        match self.api.reset_password(token, new_password).await {
            Ok(response) => Ok(self.message_succeeded(response.message)),
            Err(e) => Err(self.action_failed(op_id, "reset_password", &e, REQUEST_FAILED_MESSAGE)),
        }
    }

    fn message_succeeded(&self, message: String) -> String {
        self.notify(Notice::success(message.clone()));
        message
    }

    fn action_failed(&self, op_id: Uuid, action: &str, err: &AuthError, fallback: &str) -> Feedback {
        let feedback = Feedback::for_form(err, fallback);
        warn!(
            %op_id,
            action,
            error = %err,
            code = ?err.code(),
            status = ?err.status(),
            fields = feedback.field_errors.len(),
            "Action failed"
        );
        self.notify(Notice::error(feedback.message.clone()));
        feedback
    }

    fn notify(&self, notice: Notice) {
        self.events.publish(AuthEvent::Notice(notice));
    }

    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.current_epoch() == epoch
    }

    /// Apply `state` if `epoch` is still the mounted view; returns the state in force
    async fn commit(&self, epoch: u64, state: RenderState) -> RenderState {
        if !self.is_current(epoch) {
            debug!(epoch, state = %state, "Ignoring state change for unmounted view");
            return self.state().await;
        }
        self.set_state(state).await;
        state
    }

    async fn set_state(&self, state: RenderState) {
        let previous = {
            let mut current = self.state.write().await;
            std::mem::replace(&mut *current, state)
        };

        if previous != state {
            info!(from = %previous, to = %state, "Render state changed");
            self.events.publish(AuthEvent::StateChanged {
                from: previous,
                to: state,
            });
        }
    }
}
