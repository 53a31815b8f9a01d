//! Admin user management state.
//!
//! Status changes and deletions are applied to the cached page in place
//! once the server confirms them, keeping list order and pagination.

use std::sync::{PoisonError, RwLock};

use tracing::info;

use crate::error::{ActionError, ActionResult};
use crate::models::user::UserListParams;
use crate::models::{Page, Pagination, User, UserStatus};
use crate::services::UserService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAdminState {
    pub users: Vec<User>,
    pub selected: Option<User>,
    pub pagination: Pagination,
    pub loading: bool,
    pub error: Option<String>,
}

impl Default for UserAdminState {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            selected: None,
            pagination: Pagination::with_limit(20),
            loading: false,
            error: None,
        }
    }
}

pub struct UserAdminStore {
    service: UserService,
    state: RwLock<UserAdminState>,
}

impl UserAdminStore {
    #[must_use]
    pub fn new(service: UserService) -> Self {
        Self { service, state: RwLock::new(UserAdminState::default()) }
    }

    #[must_use]
    pub fn snapshot(&self) -> UserAdminState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// # Errors
    ///
    /// Server message or "Failed to fetch users".
    pub async fn fetch_users(&self, params: &UserListParams) -> ActionResult<Page<User>> {
        self.begin();
        let result = self.service.list(params).await;
        self.end(result, "Failed to fetch users", |s, page| {
            s.users.clone_from(&page.data);
            s.pagination = page.pagination();
        })
    }

    /// # Errors
    ///
    /// Server message or "Failed to fetch user".
    pub async fn fetch_user(&self, id: &str) -> ActionResult<User> {
        self.begin();
        let result = self.service.get(id).await;
        self.end(result, "Failed to fetch user", |s, user| s.selected = Some(user.clone()))
    }

    /// # Errors
    ///
    /// Server message or "Failed to update user status".
    pub async fn update_status(&self, id: &str, status: UserStatus) -> ActionResult<User> {
        self.begin();
        let result = self.service.update_status(id, status).await;
        self.end(result, "Failed to update user status", |s, user| {
            if let Some(slot) = s.users.iter_mut().find(|u| u.id == user.id) {
                *slot = user.clone();
            }
            if s.selected.as_ref().is_some_and(|u| u.id == user.id) {
                s.selected = Some(user.clone());
            }
            info!(user_id = %user.id, status = user.status.as_str(), "user status updated");
        })
    }

    /// # Errors
    ///
    /// Server message or "Failed to delete user".
    pub async fn delete_user(&self, id: &str) -> ActionResult {
        self.begin();
        let result = self.service.delete(id).await;
        self.end(result, "Failed to delete user", |s, _| {
            let before = s.users.len();
            s.users.retain(|u| u.id != id);
            if s.users.len() < before {
                s.pagination.total = s.pagination.total.saturating_sub(1);
            }
            if s.selected.as_ref().is_some_and(|u| u.id == id) {
                s.selected = None;
            }
        })
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut UserAdminState) -> R) -> R {
        f(&mut self.state.write().unwrap_or_else(PoisonError::into_inner))
    }

    fn begin(&self) {
        self.mutate(|s| {
            s.loading = true;
            s.error = None;
        });
    }

    fn end<T>(
        &self,
        result: Result<T, crate::http::ApiError>,
        fallback: &str,
        apply: impl FnOnce(&mut UserAdminState, &T),
    ) -> ActionResult<T> {
        self.mutate(|s| {
            s.loading = false;
            match result {
                Ok(value) => {
                    apply(s, &value);
                    Ok(value)
                }
                Err(e) => {
                    let err = ActionError::from_api(&e, fallback);
                    s.error = Some(err.message.clone());
                    Err(err)
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "users_test.rs"]
mod tests;
