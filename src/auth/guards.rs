//! Route guards: pre-navigation checks against the credential store.
//!
//! Each guard looks at the session and the target path and either lets the
//! navigation proceed or names where to go instead. During server-side
//! rendering there is no client session yet, so every guard proceeds.

use tokio::sync::OnceCell;
use tracing::debug;

use super::store::CredentialStore;
use crate::navigation::Location;

/// Where a guard is being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Interactive client with a live session.
    Client,
    /// Non-interactive (server-rendered) pass; guards are inert.
    Server,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Proceed,
    Redirect(Location),
}

impl GuardOutcome {
    #[must_use]
    pub fn is_proceed(&self) -> bool {
        matches!(self, Self::Proceed)
    }
}

/// Require a signed-in user, loading the user record if only tokens exist.
///
/// `to` is the full target path (with query) used as the login `redirect`.
pub async fn auth_guard(mode: RenderMode, store: &CredentialStore, to: &str) -> GuardOutcome {
    if mode == RenderMode::Server {
        return GuardOutcome::Proceed;
    }
    if !store.is_authenticated() {
        debug!(to, "auth guard: not authenticated");
        return GuardOutcome::Redirect(Location::login_with_redirect(to));
    }
    if !store.has_user() && !store.fetch_current_user().await {
        debug!(to, "auth guard: stored session is no longer valid");
        return GuardOutcome::Redirect(Location::login_with_redirect(to));
    }
    GuardOutcome::Proceed
}

/// Keep signed-in users away from guest-only views (login, register).
#[must_use]
pub fn guest_guard(mode: RenderMode, store: &CredentialStore) -> GuardOutcome {
    if mode == RenderMode::Client && store.is_authenticated() {
        return GuardOutcome::Redirect(Location::home());
    }
    GuardOutcome::Proceed
}

/// Everything `auth_guard` checks, plus the ADMIN role.
pub async fn admin_guard(mode: RenderMode, store: &CredentialStore, to: &str) -> GuardOutcome {
    if mode == RenderMode::Server {
        return GuardOutcome::Proceed;
    }
    match auth_guard(mode, store, to).await {
        GuardOutcome::Proceed if store.is_admin() => GuardOutcome::Proceed,
        GuardOutcome::Proceed => {
            debug!(to, role = ?store.user_role(), "admin guard: insufficient role");
            GuardOutcome::Redirect(Location::home())
        }
        redirect @ GuardOutcome::Redirect(_) => redirect,
    }
}

/// One-time startup validation of a session restored from storage.
///
/// If tokens were persisted but the user record was not, the first client
/// navigation validates them with `fetch_current_user`. Later calls are no-ops.
#[derive(Debug, Default)]
pub struct AuthBootstrap {
    done: OnceCell<()>,
}

impl AuthBootstrap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done.initialized()
    }

    pub async fn run(&self, mode: RenderMode, store: &CredentialStore) {
        if mode == RenderMode::Server {
            return;
        }
        self.done
            .get_or_init(|| async {
                if store.is_authenticated() && !store.has_user() {
                    let valid = store.fetch_current_user().await;
                    debug!(valid, "validated restored session");
                }
            })
            .await;
    }
}

#[cfg(test)]
#[path = "guards_test.rs"]
mod tests;
