//! User endpoints: the current account and admin user management.

use crate::api::ApiClient;
use crate::http::ApiError;
use crate::models::user::{UpdateUserStatusData, UserListParams};
use crate::models::{Page, User, UserStatus};

#[derive(Clone)]
pub struct UserService {
    api: ApiClient,
}

impl UserService {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn me(&self) -> Result<User, ApiError> {
        self.api.get("/users/me").await
    }

    /// Admin: one page of users filtered by role/status.
    ///
    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn list(&self, params: &UserListParams) -> Result<Page<User>, ApiError> {
        self.api
            .get(&params.to_list_params().apply("/users"))
            .await
    }

    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn get(&self, id: &str) -> Result<User, ApiError> {
        self.api.get(&format!("/users/{id}")).await
    }

    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn update_status(&self, id: &str, status: UserStatus) -> Result<User, ApiError> {
        self.api
            .put(&format!("/users/{id}/status"), &UpdateUserStatusData { status })
            .await
    }

    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.api.delete(&format!("/users/{id}")).await
    }
}
