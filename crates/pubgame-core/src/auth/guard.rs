use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use super::TokenStore;

/// Default login entry point
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// Redirect capability used by the session guard.
pub trait Navigator: Send + Sync {
    /// Location the client is currently showing
    fn current_path(&self) -> String;

    /// Move the client to `path`
    fn navigate(&self, path: &str);
}

#[derive(Debug, Default)]
struct History {
    current: String,
    visited: Vec<String>,
}

/// Navigator that only tracks where the client is and where it has been sent.
#[derive(Debug, Default)]
pub struct HistoryNavigator {
    state: Mutex<History>,
}

impl HistoryNavigator {
    pub fn new(initial: &str) -> Self {
        Self {
            state: Mutex::new(History {
                current: initial.to_string(),
                visited: Vec::new(),
            }),
        }
    }

    /// Every navigation performed, oldest first
    pub fn history(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .visited
            .clone()
    }
}

impl Navigator for HistoryNavigator {
    fn current_path(&self) -> String {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .current
            .clone()
    }

    fn navigate(&self, path: &str) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.current = path.to_string();
        state.visited.push(path.to_string());
    }
}

/// Reacts to authentication failures: drops the session and sends the client
/// to the login entry point.
#[derive(Clone)]
pub struct SessionGuard {
    store: Arc<dyn TokenStore>,
    navigator: Arc<dyn Navigator>,
    login_path: String,
}

impl SessionGuard {
    pub fn new(
        store: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
        login_path: impl Into<String>,
    ) -> Self {
        Self {
            store,
            navigator,
            login_path: login_path.into(),
        }
    }

    /// Clear the session and redirect, unless the client is already on the
    /// login page (a failing login request must not loop).
    pub fn on_auth_failure(&self) {
        self.store.clear();

        let current = self.navigator.current_path();
        if same_route(&current, &self.login_path) {
            debug!(path = %current, "Auth failure on login page, not redirecting");
            return;
        }

        info!(from = %current, to = %self.login_path, "Session rejected, redirecting to login");
        self.navigator.navigate(&self.login_path);
    }
}

/// Compare two locations ignoring query strings and trailing slashes.
fn same_route(a: &str, b: &str) -> bool {
    fn route(path: &str) -> &str {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            "/"
        } else {
            trimmed
        }
    }
    route(a) == route(b)
}
