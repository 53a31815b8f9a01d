//! Credential store: the single owner of session state.
//!
//! ARCHITECTURE
//! ============
//! `Session` lives behind a `std::sync::RwLock` that is only ever held for
//! a synchronous block, never across an `.await`. Each action reads what it
//! needs, releases the lock, talks to the network, then applies its result
//! in one write. Readers therefore never observe a half-applied login or a
//! partially cleared session.
//!
//! PERSISTENCE
//! ===========
//! Every mutation writes `{ accessToken, refreshToken, user }` through to
//! `Storage` under `art-gallery-auth`. Profile and preferences are caches
//! refetched on demand and are not persisted. Storage failures are logged
//! and never fail the action that caused them.
//!
//! The store talks to the raw transport, not the intercepting client: its
//! own 401 handling (one refresh, one retry) must not recurse into the
//! interceptor's recovery path.
//!
//! REFRESH
//! =======
//! The store owns the refresh single-flight. Every refresh, whether started
//! by the interceptor, a guard or a store action, joins the same flight, so
//! a refresh token is never presented twice.
//!
//! INVARIANTS
//! ==========
//! Results that arrive after an `.await` are applied only if the session is
//! still the one the request was made for. A refresh applies only while the
//! refresh token it sent is still held; other fetches apply only while the
//! session epoch is unchanged. Login and `clear_auth` start a new epoch, so
//! a logout during a pending request stays a logout.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::single_flight::{Flight, SingleFlight};
use crate::error::{ActionError, ActionResult};
use crate::http::{ApiError, ApiRequest, ApiResponse, Transport};
use crate::models::auth::{
    ChangePasswordData, ForgotPasswordData, RefreshRequest, ResetPasswordData, VerifyEmailData,
};
use crate::models::user::{UpdatePreferencesData, UpdateProfileData};
use crate::models::{AuthResponse, LoginCredentials, RegisterData, Role, User, UserPreferences, UserProfile};
use crate::storage::{self, Storage};

pub const AUTH_STORAGE_KEY: &str = "art-gallery-auth";

pub const LOGIN_ENDPOINT: &str = "/auth/login";
pub const REGISTER_ENDPOINT: &str = "/auth/register";
pub const REFRESH_ENDPOINT: &str = "/auth/refresh";
pub const LOGOUT_ENDPOINT: &str = "/auth/logout";
pub const CURRENT_USER_ENDPOINT: &str = "/users/me";
const PROFILE_ENDPOINT: &str = "/users/me/profile";
const PREFERENCES_ENDPOINT: &str = "/users/me/preferences";

// =============================================================================
// SESSION
// =============================================================================

/// Client-side authentication state.
///
/// `user` may lag behind the tokens while a fetch is pending; authentication
/// is decided by the access token alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<User>,
    pub profile: Option<UserProfile>,
    pub preferences: Option<UserPreferences>,
    pub loading: bool,
    pub error: Option<String>,
}

impl Session {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    #[must_use]
    pub fn has_user(&self) -> bool {
        self.user.is_some()
    }

    fn apply_auth_response(&mut self, response: AuthResponse) {
        self.access_token = Some(response.access_token);
        self.refresh_token = Some(response.refresh_token);
        self.user = Some(response.user);
    }

    fn clear(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
        self.user = None;
        self.profile = None;
        self.preferences = None;
        self.error = None;
    }
}

/// The durable subset of `Session`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PersistedSession {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

impl PersistedSession {
    fn from_session(session: &Session) -> Self {
        Self {
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
            user: session.user.clone(),
        }
    }

    fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.user.is_none()
    }
}

/// How a shared token refresh ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New tokens were applied to the session.
    Refreshed,
    /// The server rejected the refresh; the session was cleared.
    Failed,
    /// The session ended or changed while the refresh was pending; its
    /// result was discarded.
    Abandoned,
}

impl RefreshOutcome {
    #[must_use]
    pub fn is_refreshed(self) -> bool {
        self == Self::Refreshed
    }
}

// =============================================================================
// SESSION CELL
// =============================================================================

struct Guarded {
    session: Session,
    epoch: u64,
}

/// Locked session plus its write-through persistence.
struct SessionCell {
    guarded: RwLock<Guarded>,
    storage: Arc<dyn Storage>,
}

impl SessionCell {
    fn read<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        let guarded = self.guarded.read().unwrap_or_else(PoisonError::into_inner);
        f(&guarded.session)
    }

    fn epoch(&self) -> u64 {
        self.guarded.read().unwrap_or_else(PoisonError::into_inner).epoch
    }

    /// Apply `f` and write the durable subset through to storage.
    fn update<R>(&self, f: impl FnOnce(&mut Guarded) -> R) -> R {
        let (result, persisted) = {
            let mut guarded = self.guarded.write().unwrap_or_else(PoisonError::into_inner);
            let result = f(&mut guarded);
            (result, PersistedSession::from_session(&guarded.session))
        };
        self.persist(&persisted);
        result
    }

    /// Apply `f` only if no login or clear happened since `epoch`.
    fn update_if_current(&self, epoch: u64, f: impl FnOnce(&mut Session)) -> bool {
        self.update(|g| {
            let current = g.epoch == epoch;
            if current {
                f(&mut g.session);
            }
            current
        })
    }

    fn reset(g: &mut Guarded) {
        g.session.clear();
        g.epoch += 1;
    }

    fn persist(&self, persisted: &PersistedSession) {
        let outcome = if persisted.is_empty() {
            self.storage.remove(AUTH_STORAGE_KEY)
        } else {
            storage::save_json(self.storage.as_ref(), AUTH_STORAGE_KEY, persisted)
        };
        if let Err(e) = outcome {
            warn!(error = %e, "failed to persist session");
        }
    }
}

/// One `/auth/refresh` exchange. Runs inside the store's single-flight.
async fn exchange_refresh_token(transport: Arc<dyn Transport>, cell: Arc<SessionCell>) -> RefreshOutcome {
    let Some(sent) = cell.read(|s| s.refresh_token.clone()) else {
        return RefreshOutcome::Abandoned;
    };

    let result = match ApiRequest::post(REFRESH_ENDPOINT).json(&RefreshRequest { refresh_token: &sent }) {
        Ok(request) => transport
            .send(request)
            .await
            .and_then(|r| r.json::<AuthResponse>()),
        Err(e) => Err(e),
    };

    match result {
        Ok(response) => {
            let applied = cell.update(|g| {
                let current = g.session.refresh_token.as_deref() == Some(sent.as_str());
                if current {
                    g.session.apply_auth_response(response);
                }
                current
            });
            if applied {
                info!("access token refreshed");
                RefreshOutcome::Refreshed
            } else {
                info!("session changed during refresh; discarding new tokens");
                RefreshOutcome::Abandoned
            }
        }
        Err(e) => {
            warn!(error = %e, status = ?e.status(), "token refresh failed; clearing session");
            let cleared = cell.update(|g| {
                let current = g.session.refresh_token.as_deref() == Some(sent.as_str());
                if current {
                    SessionCell::reset(g);
                }
                current
            });
            if cleared { RefreshOutcome::Failed } else { RefreshOutcome::Abandoned }
        }
    }
}

// =============================================================================
// STORE
// =============================================================================

pub struct CredentialStore {
    transport: Arc<dyn Transport>,
    cell: Arc<SessionCell>,
    refresh: SingleFlight<RefreshOutcome>,
}

impl CredentialStore {
    /// Build a store, restoring any session persisted in `storage`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, storage: Arc<dyn Storage>) -> Self {
        let session = restore(storage.as_ref());
        let cell = SessionCell { guarded: RwLock::new(Guarded { session, epoch: 0 }), storage };
        Self { transport, cell: Arc::new(cell), refresh: SingleFlight::new() }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Point-in-time copy of the whole session.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.read(Clone::clone)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.read(Session::is_authenticated)
    }

    #[must_use]
    pub fn has_user(&self) -> bool {
        self.read(Session::has_user)
    }

    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.read(|s| s.access_token.clone())
    }

    #[must_use]
    pub fn has_refresh_token(&self) -> bool {
        self.read(|s| s.refresh_token.is_some())
    }

    /// Whether a token refresh is currently pending.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.refresh.is_in_flight()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.read(|s| s.user.clone())
    }

    #[must_use]
    pub fn user_role(&self) -> Option<Role> {
        self.read(|s| s.user.as_ref().map(|u| u.role))
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user_role() == Some(Role::Admin)
    }

    #[must_use]
    pub fn is_artist(&self) -> bool {
        self.user_role() == Some(Role::Artist)
    }

    #[must_use]
    pub fn is_email_verified(&self) -> bool {
        self.read(|s| s.user.as_ref().is_some_and(|u| u.email_verified))
    }

    /// Display name for the signed-in user; empty when signed out.
    #[must_use]
    pub fn full_name(&self) -> String {
        self.read(|s| s.user.as_ref().map(User::full_name).unwrap_or_default())
    }

    #[must_use]
    pub fn profile(&self) -> Option<UserProfile> {
        self.read(|s| s.profile.clone())
    }

    #[must_use]
    pub fn preferences(&self) -> Option<UserPreferences> {
        self.read(|s| s.preferences.clone())
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.read(|s| s.loading)
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.read(|s| s.error.clone())
    }

    // -------------------------------------------------------------------------
    // Session lifecycle
    // -------------------------------------------------------------------------

    /// Sign in, then backfill the user record from `/users/me`.
    ///
    /// # Errors
    ///
    /// Returns the server's message (or a generic one) if the credentials
    /// are rejected or the session could not be established.
    pub async fn login(&self, credentials: &LoginCredentials) -> ActionResult {
        self.establish(LOGIN_ENDPOINT, credentials, "Login failed. Please try again.")
            .await
    }

    /// Create an account and sign in, same contract as [`Self::login`].
    ///
    /// # Errors
    ///
    /// Returns the server's message (or a generic one) on failure.
    pub async fn register(&self, data: &RegisterData) -> ActionResult {
        self.establish(REGISTER_ENDPOINT, data, "Registration failed. Please try again.")
            .await
    }

    async fn establish<B: Serialize + Sync>(&self, path: &str, body: &B, fallback: &str) -> ActionResult {
        self.begin_action();
        let result = self.establish_inner(path, body, fallback).await;
        self.end_action();
        result
    }

    async fn establish_inner<B: Serialize + Sync>(&self, path: &str, body: &B, fallback: &str) -> ActionResult {
        let request = ApiRequest::post(path)
            .json(body)
            .map_err(|e| self.fail(&e, fallback))?;
        let response = self
            .transport
            .send(request)
            .await
            .and_then(|r| r.json::<AuthResponse>())
            .map_err(|e| self.fail(&e, fallback))?;

        let user_id = response.user.id.clone();
        self.cell.update(|g| {
            g.session.apply_auth_response(response);
            g.epoch += 1;
        });
        info!(%user_id, path, "session established");

        // The auth response carries a partial user; backfill the rest.
        if !self.fetch_current_user().await && !self.is_authenticated() {
            return Err(self.fail_with(ActionError::new(fallback)));
        }
        Ok(())
    }

    /// Invalidate the server session (best effort), then clear locally.
    ///
    /// Always leaves the store signed out, whatever the server says.
    pub async fn logout(&self) {
        if let Some(token) = self.access_token() {
            let request = ApiRequest::post(LOGOUT_ENDPOINT).bearer(Some(&token));
            if let Err(e) = self.transport.send(request).await {
                warn!(error = %e, "server logout failed; clearing local session anyway");
            }
        }
        self.clear_auth();
        info!("logged out");
    }

    /// Exchange the refresh token for a fresh token pair.
    ///
    /// Returns `false` without touching the network when no refresh token is
    /// held. Joins a refresh that is already pending instead of starting a
    /// second one. Any failure clears the session. Never retries on 401.
    pub async fn refresh_access_token(&self) -> bool {
        if !self.has_refresh_token() && !self.is_refreshing() {
            debug!("refresh skipped: no refresh token");
            return false;
        }
        self.refresh_shared().await.value.is_refreshed()
    }

    /// Start or join the shared refresh and report how it ended.
    pub(crate) async fn refresh_shared(&self) -> Flight<RefreshOutcome> {
        let transport = Arc::clone(&self.transport);
        let cell = Arc::clone(&self.cell);
        self.refresh
            .run(move || exchange_refresh_token(transport, cell))
            .await
    }

    /// Load `/users/me` with the stored token.
    ///
    /// On 401, refreshes once and retries once. Any remaining failure clears
    /// the session. Used to validate a token restored from storage.
    pub async fn fetch_current_user(&self) -> bool {
        if !self.is_authenticated() {
            return false;
        }
        let epoch = self.cell.epoch();
        match self
            .send_authorized(ApiRequest::get(CURRENT_USER_ENDPOINT))
            .await
            .and_then(|r| r.json::<User>())
        {
            Ok(user) => self.cell.update_if_current(epoch, |s| s.user = Some(user)),
            Err(e) => {
                warn!(error = %e, status = ?e.status(), "current user fetch failed; clearing session");
                self.cell.update(|g| {
                    if g.epoch == epoch {
                        SessionCell::reset(g);
                    }
                });
                false
            }
        }
    }

    /// Reset every session field. Idempotent.
    ///
    /// `loading` is left alone: an action in progress still owns it.
    pub fn clear_auth(&self) {
        self.cell.update(SessionCell::reset);
    }

    // -------------------------------------------------------------------------
    // Account recovery & verification
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns the server's message or "Failed to send reset email.".
    pub async fn forgot_password(&self, email: &str) -> ActionResult {
        self.unauthenticated_action("/auth/forgot-password", &ForgotPasswordData { email }, "Failed to send reset email.")
            .await
    }

    /// # Errors
    ///
    /// Returns the server's message or "Failed to reset password.".
    pub async fn reset_password(&self, token: &str, password: &str) -> ActionResult {
        self.unauthenticated_action(
            "/auth/reset-password",
            &ResetPasswordData { token, password },
            "Failed to reset password.",
        )
        .await
    }

    /// Confirm an email address; flips `email_verified` on the loaded user.
    ///
    /// # Errors
    ///
    /// Returns the server's message or "Failed to verify email.".
    pub async fn verify_email(&self, token: &str) -> ActionResult {
        let epoch = self.cell.epoch();
        self.unauthenticated_action("/auth/verify-email", &VerifyEmailData { token }, "Failed to verify email.")
            .await?;
        self.cell.update_if_current(epoch, |s| {
            if let Some(user) = s.user.as_mut() {
                user.email_verified = true;
            }
        });
        Ok(())
    }

    /// # Errors
    ///
    /// Returns "Not authenticated" without a session, otherwise the server's
    /// message or "Failed to change password.".
    pub async fn change_password(&self, current_password: &str, new_password: &str) -> ActionResult {
        let body = ChangePasswordData { current_password, new_password };
        self.authorized_action(ApiRequest::post("/auth/change-password"), Some(&body), "Failed to change password.")
            .await
            .map(drop)
    }

    /// # Errors
    ///
    /// Returns "Not authenticated" without a session, otherwise the server's
    /// message or "Failed to resend verification email.".
    pub async fn resend_verification(&self) -> ActionResult {
        self.authorized_action::<()>(
            ApiRequest::post("/auth/resend-verification"),
            None,
            "Failed to resend verification email.",
        )
        .await
        .map(drop)
    }

    // -------------------------------------------------------------------------
    // Profile & preferences
    // -------------------------------------------------------------------------

    /// Fetch the signed-in user's profile.
    ///
    /// A 404 means the user has not created a profile yet and yields
    /// `Ok(None)`, not an error.
    ///
    /// # Errors
    ///
    /// Returns the server's message or "Failed to fetch profile.".
    pub async fn fetch_profile(&self) -> ActionResult<Option<UserProfile>> {
        if !self.is_authenticated() {
            return Ok(None);
        }
        let epoch = self.cell.epoch();
        match self
            .send_authorized(ApiRequest::get(PROFILE_ENDPOINT))
            .await
            .and_then(|r| r.json::<UserProfile>())
        {
            Ok(profile) => {
                self.cell.update_if_current(epoch, |s| s.profile = Some(profile.clone()));
                Ok(Some(profile))
            }
            Err(e) if e.is_not_found() => {
                self.cell.update_if_current(epoch, |s| s.profile = None);
                Ok(None)
            }
            Err(e) => Err(self.fail(&e, "Failed to fetch profile.")),
        }
    }

    /// Replace the profile wholesale with the server's updated copy.
    ///
    /// # Errors
    ///
    /// Returns "Not authenticated" without a session, otherwise the server's
    /// message or "Failed to update profile.".
    pub async fn update_profile(&self, data: &UpdateProfileData) -> ActionResult<UserProfile> {
        self.begin_action();
        let epoch = self.cell.epoch();
        let result = self
            .authorized_action(ApiRequest::put(PROFILE_ENDPOINT), Some(data), "Failed to update profile.")
            .await
            .and_then(|r| decode_or_fail::<UserProfile>(self, &r, "Failed to update profile."));
        if let Ok(profile) = &result {
            self.cell.update_if_current(epoch, |s| {
                s.profile = Some(profile.clone());
                if let Some(user) = s.user.as_mut() {
                    user.profile = Some(profile.clone());
                }
            });
        }
        self.end_action();
        result
    }

    /// # Errors
    ///
    /// Returns the server's message or "Failed to fetch preferences.".
    pub async fn fetch_preferences(&self) -> ActionResult<Option<UserPreferences>> {
        if !self.is_authenticated() {
            return Ok(None);
        }
        let epoch = self.cell.epoch();
        match self
            .send_authorized(ApiRequest::get(PREFERENCES_ENDPOINT))
            .await
            .and_then(|r| r.json::<UserPreferences>())
        {
            Ok(preferences) => {
                self.cell.update_if_current(epoch, |s| s.preferences = Some(preferences.clone()));
                Ok(Some(preferences))
            }
            Err(e) => Err(self.fail(&e, "Failed to fetch preferences.")),
        }
    }

    /// # Errors
    ///
    /// Returns "Not authenticated" without a session, otherwise the server's
    /// message or "Failed to update preferences.".
    pub async fn update_preferences(&self, data: &UpdatePreferencesData) -> ActionResult<UserPreferences> {
        self.begin_action();
        let epoch = self.cell.epoch();
        let result = self
            .authorized_action(ApiRequest::put(PREFERENCES_ENDPOINT), Some(data), "Failed to update preferences.")
            .await
            .and_then(|r| decode_or_fail::<UserPreferences>(self, &r, "Failed to update preferences."));
        if let Ok(preferences) = &result {
            self.cell.update_if_current(epoch, |s| s.preferences = Some(preferences.clone()));
        }
        self.end_action();
        result
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn read<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        self.cell.read(f)
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        self.cell.update(|g| f(&mut g.session))
    }

    fn begin_action(&self) {
        self.mutate(|s| {
            s.loading = true;
            s.error = None;
        });
    }

    fn end_action(&self) {
        self.mutate(|s| s.loading = false);
    }

    fn fail(&self, err: &ApiError, fallback: &str) -> ActionError {
        debug!(code = err.error_code(), status = ?err.status(), "store action failed");
        self.fail_with(ActionError::from_api(err, fallback))
    }

    fn fail_with(&self, err: ActionError) -> ActionError {
        self.mutate(|s| s.error = Some(err.message.clone()));
        err
    }

    /// Send with the current bearer token; on 401 refresh once and retry once.
    ///
    /// A token rotated while the request was out is retried directly.
    async fn send_authorized(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let sent = self
            .access_token()
            .ok_or_else(|| ApiError::InvalidRequest("not authenticated".into()))?;
        match self
            .transport
            .send(request.clone().bearer(Some(&sent)))
            .await
        {
            Err(e) if e.is_unauthorized() => {
                let token = match self.access_token() {
                    Some(current) if current != sent => current,
                    _ => {
                        if !self.refresh_access_token().await {
                            return Err(e);
                        }
                        let Some(token) = self.access_token() else {
                            return Err(e);
                        };
                        token
                    }
                };
                debug!(path = %request.path, "retrying with rotated token");
                self.transport.send(request.bearer(Some(&token))).await
            }
            other => other,
        }
    }

    async fn unauthenticated_action<B: Serialize + Sync>(&self, path: &str, body: &B, fallback: &str) -> ActionResult {
        self.begin_action();
        let result = match ApiRequest::post(path).json(body) {
            Ok(request) => self.transport.send(request).await.map(drop),
            Err(e) => Err(e),
        }
        .map_err(|e| self.fail(&e, fallback));
        self.end_action();
        result
    }

    async fn authorized_action<B: Serialize + Sync>(
        &self,
        request: ApiRequest,
        body: Option<&B>,
        fallback: &str,
    ) -> ActionResult<ApiResponse> {
        if !self.is_authenticated() {
            return Err(self.fail_with(ActionError::not_authenticated()));
        }
        let request = match body {
            Some(body) => request.json(body).map_err(|e| self.fail(&e, fallback))?,
            None => request,
        };
        self.send_authorized(request)
            .await
            .map_err(|e| self.fail(&e, fallback))
    }
}

fn decode_or_fail<T: serde::de::DeserializeOwned>(
    store: &CredentialStore,
    response: &ApiResponse,
    fallback: &str,
) -> ActionResult<T> {
    response.json::<T>().map_err(|e| store.fail(&e, fallback))
}

fn restore(storage: &dyn Storage) -> Session {
    match storage::load_json::<PersistedSession>(storage, AUTH_STORAGE_KEY) {
        Ok(Some(persisted)) => {
            debug!(authenticated = persisted.access_token.is_some(), "restored persisted session");
            Session {
                access_token: persisted.access_token,
                refresh_token: persisted.refresh_token,
                user: persisted.user,
                ..Session::default()
            }
        }
        Ok(None) => Session::default(),
        Err(e) => {
            warn!(error = %e, "ignoring unreadable persisted session");
            Session::default()
        }
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
