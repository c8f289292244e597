use std::sync::RwLock;

use tracing::{debug, info, warn};
use url::Url;

use crate::error::{AuthError, AuthResult};

/// The visible location and the ways the orchestrator may change it
pub trait Navigator: Send + Sync {
    fn current_url(&self) -> Url;

    /// Change the visible URL without a page load or a new history entry
    fn replace_url(&self, url: Url);

    /// Leave the console for `url` with a full-page navigation
    fn redirect(&self, url: &str) -> AuthResult<()>;
}

/// Navigator that only records what it was asked to do
#[derive(Debug)]
pub struct MemoryNavigator {
    current: RwLock<Url>,
    redirects: RwLock<Vec<String>>,
}

impl MemoryNavigator {
    pub fn new(start: Url) -> Self {
        Self {
            current: RwLock::new(start),
            redirects: RwLock::new(Vec::new()),
        }
    }

    pub fn parse(start: &str) -> AuthResult<Self> {
        let url = Url::parse(start).map_err(|e| AuthError::Config {
            key: "start_url".to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(url))
    }

    /// Simulate the user arriving at `url`
    pub fn visit(&self, url: Url) {
        if let Ok(mut current) = self.current.write() {
            *current = url;
        }
    }

    pub fn redirects(&self) -> Vec<String> {
        self.redirects.read().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Navigator for MemoryNavigator {
    fn current_url(&self) -> Url {
        match self.current.read() {
            Ok(current) => current.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace_url(&self, url: Url) {
        debug!(url = %url, "Replacing visible URL");
        self.visit(url);
    }

    fn redirect(&self, url: &str) -> AuthResult<()> {
        Url::parse(url).map_err(|e| AuthError::Decode(format!("invalid redirect URL: {}", e)))?;
        if let Ok(mut redirects) = self.redirects.write() {
            redirects.push(url.to_string());
        }
        Ok(())
    }
}

/// Navigator for the command line: redirects open the system browser
#[derive(Debug)]
pub struct BrowserNavigator {
    inner: MemoryNavigator,
}

impl BrowserNavigator {
    pub fn new(start: Url) -> Self {
        Self {
            inner: MemoryNavigator::new(start),
        }
    }
}

impl Navigator for BrowserNavigator {
    fn current_url(&self) -> Url {
        self.inner.current_url()
    }

    fn replace_url(&self, url: Url) {
        self.inner.replace_url(url)
    }

    fn redirect(&self, url: &str) -> AuthResult<()> {
        self.inner.redirect(url)?;
        info!(url = %url, "Opening browser for sign-in");
        if let Err(e) = open::that(url) {
            warn!(error = %e, "Could not open a browser, visit the URL manually");
        }
        Ok(())
    }
}
