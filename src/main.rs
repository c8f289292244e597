use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use grading_lib::auth::{BrowserNavigator, NoticeLevel};
use grading_lib::{AppState, AuthEvent, ClientConfig, Feedback, RegisterRequest, Route};

/// Session file used by the command line when none is configured
const DEFAULT_SESSION_FILE: &str = ".grading-session.json";

#[derive(Parser)]
#[command(name = "grading")]
#[command(version)]
#[command(about = "Sign in to the grading console from the command line")]
struct Cli {
    /// Console location to start from
    #[arg(long, global = true, default_value = "http://localhost:5173/")]
    location: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the startup checks and print the resulting state
    Status,
    /// Sign in with a username and password
    Login {
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account
    Register {
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        full_name: String,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Open Google's sign-in page in the browser
    GoogleLogin,
    /// Finish Google sign-in from the URL the browser landed on
    Callback {
        #[arg(value_name = "URL")]
        url: String,
    },
    /// Confirm an email address with the token from the verification mail
    Verify { token: String },
    /// Ask for a password reset email
    ForgotPassword { email: String },
    /// Set a new password with the token from the reset email
    ResetPassword {
        token: String,
        #[arg(long)]
        new_password: String,
    },
    /// Check whether the stored session may open a page
    Guard {
        #[arg(value_name = "PATH")]
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    let env_file_path = dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if cfg!(debug_assertions) {
                "grading_lib=debug,grading=debug,warn".into()
            } else {
                "grading_lib=info,grading=info,warn".into()
            }
        }))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    match env_file_path {
        Some(path) => info!("Loaded environment variables from {}", path.display()),
        None => debug!("No .env file found. Using existing environment variables."),
    };

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env()?;
    config
        .session_file
        .get_or_insert_with(|| PathBuf::from(DEFAULT_SESSION_FILE));

    let start = match &cli.command {
        Commands::Callback { url } => url.as_str(),
        _ => cli.location.as_str(),
    };
    let start = Url::parse(start).with_context(|| format!("invalid location '{}'", start))?;
    let navigator = Arc::new(BrowserNavigator::new(start));

    let app = AppState::new(config, navigator)?;
    let orchestrator = app.orchestrator.clone();

    let state = orchestrator.mount().await;
    debug!(state = %state, "Startup finished");

    let outcome = match cli.command {
        Commands::Status | Commands::Callback { .. } => Ok(()),
        Commands::Login { username, password } => orchestrator
            .login(&username, &password)
            .await
            .map(|user| println!("Signed in as {} ({})", user.username, user.role)),
        Commands::Register {
            username,
            password,
            email,
            full_name,
        } => orchestrator
            .register(RegisterRequest {
                username,
                password,
                email,
                full_name,
            })
            .await
            .map(|outcome| {
                if outcome.signed_in {
                    println!("Account created and signed in");
                }
            }),
        Commands::Logout => {
            orchestrator.logout().await;
            Ok(())
        }
        Commands::GoogleLogin => orchestrator
            .initiate_google_login()
            .await
            .map(|url| println!("Continue in the browser: {}", url)),
        Commands::Verify { token } => orchestrator.verify_registration(&token).await.map(|_| ()),
        Commands::ForgotPassword { email } => orchestrator.forgot_password(&email).await.map(|_| ()),
        Commands::ResetPassword {
            token,
            new_password,
        } => orchestrator
            .reset_password(&token, &new_password)
            .await
            .map(|_| ()),
        Commands::Guard { path } => {
            let route = Route::from_path(&path).ok_or_else(|| anyhow!("unknown page '{}'", path))?;
            println!("{} -> {:?}", route, orchestrator.guard(route));
            Ok(())
        }
    };

    print_notices(&orchestrator.recent_events());
    println!("state: {}", orchestrator.state().await);
    if let Some(user) = orchestrator.current_user() {
        println!("user: {} <{}> role={}", user.username, user.email, user.role);
    }

    outcome.map_err(|feedback: Feedback| anyhow!("{}", feedback))
}

fn print_notices(events: &[AuthEvent]) {
    for event in events {
        if let AuthEvent::Notice(notice) = event {
            let tag = match notice.level {
                NoticeLevel::Success => "ok",
                NoticeLevel::Error => "error",
            };
            println!("[{}] {}", tag, notice.message);
        }
    }
}
