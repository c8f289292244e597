pub mod callback;
pub mod navigator;
pub mod orchestrator;
pub mod state;

pub use callback::{CallbackOutcome, CallbackParams, OAuthFailure};
pub use navigator::{BrowserNavigator, MemoryNavigator, Navigator};
pub use orchestrator::{AuthOrchestrator, RegistrationOutcome};
pub use state::{AuthEvent, Notice, NoticeLevel, RenderState};
