//! Navigation seam used by guards and forced logout.
//!
//! SYSTEM CONTEXT
//! ==============
//! The embedding UI owns the router. This crate only needs to read the
//! current path and request a navigation; `Navigator` is that contract.

use std::sync::{Mutex, PoisonError};

use crate::models::page::encode_query;

pub const HOME_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/auth/login";
/// Views under this prefix never trigger an expired-session redirect.
pub const AUTH_PATH_PREFIX: &str = "/auth/";

/// A navigation target: path plus ordered query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl Location {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), query: Vec::new() }
    }

    #[must_use]
    pub fn home() -> Self {
        Self::new(HOME_PATH)
    }

    /// Login view that returns to `redirect` after authentication.
    #[must_use]
    pub fn login_with_redirect(redirect: &str) -> Self {
        Self::new(LOGIN_PATH).with_query("redirect", redirect)
    }

    /// Login view for a session that expired while the user was on `redirect`.
    #[must_use]
    pub fn session_expired(redirect: &str) -> Self {
        Self::new(LOGIN_PATH)
            .with_query("expired", "true")
            .with_query("redirect", redirect)
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Render as `path?query`, percent-encoding query values.
    #[must_use]
    pub fn to_uri(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        format!("{}?{}", self.path, encode_query(&self.query))
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_uri())
    }
}

#[must_use]
pub fn is_auth_path(path: &str) -> bool {
    path.starts_with(AUTH_PATH_PREFIX)
}

pub trait Navigator: Send + Sync {
    /// Path of the view currently shown.
    fn current_path(&self) -> String;

    fn navigate(&self, to: Location);
}

/// In-process navigator that records history.
///
/// Used by the CLI (which has no router) and by embedders that drive
/// routing from the recorded location.
#[derive(Debug)]
pub struct MemoryNavigator {
    inner: Mutex<NavState>,
}

#[derive(Debug)]
struct NavState {
    current: String,
    history: Vec<Location>,
}

impl MemoryNavigator {
    #[must_use]
    pub fn new(initial_path: impl Into<String>) -> Self {
        Self { inner: Mutex::new(NavState { current: initial_path.into(), history: Vec::new() }) }
    }

    /// Every navigation requested so far, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<Location> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .clone()
    }

    #[must_use]
    pub fn last(&self) -> Option<Location> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .last()
            .cloned()
    }

    /// Move to `path` without recording a redirect (user-driven navigation).
    pub fn set_current(&self, path: impl Into<String>) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current = path.into();
    }
}

impl Default for MemoryNavigator {
    fn default() -> Self {
        Self::new(HOME_PATH)
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }

    fn navigate(&self, to: Location) {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.current.clone_from(&to.path);
        state.history.push(to);
    }
}

#[cfg(test)]
#[path = "navigation_test.rs"]
mod tests;
