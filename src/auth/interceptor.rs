//! Request interceptor: transparent recovery from access-token expiry.
//!
//! ARCHITECTURE
//! ============
//! Every application request goes out with the current bearer token. A 401
//! on a protected endpoint (while a session exists) enters refresh
//! coordination instead of surfacing to the caller:
//!
//! - no refresh pending → this caller starts the store's shared refresh
//! - refresh pending → join it, whoever started it (another request, a
//!   guard, a store action)
//! - refreshed → retry with the new token
//! - rejected → fail with the original error; the first request to claim
//!   the failed flight logs out and redirects to login with `expired=true`
//! - abandoned (the session ended meanwhile) → fail, no redirect
//! - no refresh token at all → log out and redirect
//!
//! Auth endpoints (`/auth/login`, `/auth/register`, `/auth/refresh`) are
//! never recovered: they must fail visibly, and recovering a failed refresh
//! would recurse.
//!
//! INVARIANTS
//! ==========
//! At most one `/auth/refresh` is outstanding per credential store; every
//! request that faults while it is pending observes its outcome. A failed
//! refresh redirects once, even if the request that started it was dropped.
//! A request whose 401 was caused by a token that has since been rotated
//! retries with the new token rather than starting another refresh.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};

use super::store::{CredentialStore, LOGIN_ENDPOINT, REFRESH_ENDPOINT, REGISTER_ENDPOINT, RefreshOutcome};
use crate::http::{ApiError, ApiRequest, ApiResponse, Transport};
use crate::navigation::{Location, Navigator, is_auth_path};

pub struct AuthenticatedClient {
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
    navigator: Arc<dyn Navigator>,
    /// Generation of the last failed refresh flight that was acted on.
    redirected: AtomicU64,
}

impl AuthenticatedClient {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, store: Arc<CredentialStore>, navigator: Arc<dyn Navigator>) -> Self {
        Self { transport, store, navigator, redirected: AtomicU64::new(0) }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    #[must_use]
    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    /// Whether a token refresh is currently pending.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.store.is_refreshing()
    }

    /// Send `request` with the session's bearer token, recovering from 401.
    ///
    /// # Errors
    ///
    /// Returns the transport's error when it is not an auth failure, when
    /// recovery is not possible, or the retry's own error.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let sent_token = self.store.access_token();
        match self
            .transport
            .send(request.clone().bearer(sent_token.as_deref()))
            .await
        {
            Ok(response) => Ok(response),
            Err(error) => self.recover(request, sent_token, error).await,
        }
    }

    async fn recover(
        &self,
        request: ApiRequest,
        sent_token: Option<String>,
        error: ApiError,
    ) -> Result<ApiResponse, ApiError> {
        if !error.is_unauthorized() {
            return Err(error);
        }
        let Some(current_token) = self.store.access_token() else {
            return Err(error);
        };
        if is_auth_endpoint(&request.path) {
            debug!(path = %request.path, "auth endpoint rejected; not recovering");
            return Err(error);
        }

        if sent_token.as_deref() != Some(current_token.as_str()) {
            debug!(path = %request.path, "token rotated since request was sent; retrying");
            return self.retry(request, &current_token).await;
        }

        if !self.store.is_refreshing() && !self.store.has_refresh_token() {
            warn!(path = %request.path, "401 without refresh token; ending session");
            self.logout_and_redirect();
            return Err(error);
        }

        let flight = self.store.refresh_shared().await;
        debug!(
            leader = flight.leader,
            generation = flight.generation,
            outcome = ?flight.value,
            path = %request.path,
            "refresh settled"
        );

        match flight.value {
            RefreshOutcome::Refreshed => {
                if let Some(token) = self.store.access_token() {
                    return self.retry(request, &token).await;
                }
            }
            RefreshOutcome::Failed => {
                if self.claim_redirect(flight.generation) {
                    self.logout_and_redirect();
                }
            }
            RefreshOutcome::Abandoned => {}
        }
        Err(error)
    }

    /// `true` for exactly one caller per failed flight.
    fn claim_redirect(&self, generation: u64) -> bool {
        self.redirected.fetch_max(generation, Ordering::SeqCst) < generation
    }

    async fn retry(&self, request: ApiRequest, token: &str) -> Result<ApiResponse, ApiError> {
        self.transport.send(request.bearer(Some(token))).await
    }

    /// Clear the session and send the user to login, remembering where they were.
    fn logout_and_redirect(&self) {
        self.store.clear_auth();
        let current = self.navigator.current_path();
        if is_auth_path(&current) {
            return;
        }
        info!(from = %current, "session expired; redirecting to login");
        self.navigator.navigate(Location::session_expired(&current));
    }
}

/// Endpoints whose 401 must surface instead of triggering recovery.
#[must_use]
pub fn is_auth_endpoint(path: &str) -> bool {
    [LOGIN_ENDPOINT, REGISTER_ENDPOINT, REFRESH_ENDPOINT]
        .iter()
        .any(|endpoint| path.contains(endpoint))
}

#[cfg(test)]
#[path = "interceptor_test.rs"]
mod tests;
