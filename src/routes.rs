use std::fmt;

use serde::{Deserialize, Serialize};

use crate::session::SessionStore;

/// Pages of the console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Route {
    Dashboard,
    Assignments,
    Grades,
    Students,
    Reports,
    Profile,
    Settings,
    AdminDashboard,
}

impl Route {
    pub const ALL: [Route; 8] = [
        Route::Dashboard,
        Route::Assignments,
        Route::Grades,
        Route::Students,
        Route::Reports,
        Route::Profile,
        Route::Settings,
        Route::AdminDashboard,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Dashboard => "/",
            Route::Assignments => "/assignments",
            Route::Grades => "/grades",
            Route::Students => "/students",
            Route::Reports => "/reports",
            Route::Profile => "/profile",
            Route::Settings => "/settings",
            Route::AdminDashboard => "/admin/dashboard",
        }
    }

    pub fn from_path(path: &str) -> Option<Route> {
        let trimmed = match path.trim_end_matches('/') {
            "" => "/",
            p => p,
        };
        Route::ALL.into_iter().find(|route| route.path() == trimmed)
    }

    pub fn requires_admin(&self) -> bool {
        matches!(self, Route::AdminDashboard)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    /// Nobody is signed in
    RedirectToLogin,
    /// Signed in, but the page needs the admin role
    RedirectHome,
}

/// Gate a page on the stored session
pub fn guard(route: Route, store: &SessionStore) -> RouteDecision {
    if !store.is_authenticated() {
        return RouteDecision::RedirectToLogin;
    }
    if route.requires_admin() && !store.is_admin() {
        return RouteDecision::RedirectHome;
    }
    RouteDecision::Allow
}
