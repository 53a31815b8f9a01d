//! Notification endpoints.

use serde_json::json;

use crate::api::ApiClient;
use crate::http::{ApiError, ApiRequest};
use crate::models::notification::{
    CountResponse, CreateBulkNotificationData, CreateNotificationData, Notification, NotificationCount,
    NotificationListParams, NotificationPage,
};

const NOTIFICATIONS: &str = "/notifications";

#[derive(Clone)]
pub struct NotificationService {
    api: ApiClient,
}

impl NotificationService {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn list(&self, params: &NotificationListParams) -> Result<NotificationPage, ApiError> {
        self.api
            .get(&params.to_list_params().apply(NOTIFICATIONS))
            .await
    }

    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn count(&self) -> Result<NotificationCount, ApiError> {
        self.api.get("/notifications/count").await
    }

    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn get(&self, id: &str) -> Result<Notification, ApiError> {
        self.api.get(&format!("{NOTIFICATIONS}/{id}")).await
    }

    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn mark_read(&self, id: &str) -> Result<Notification, ApiError> {
        self.api
            .put(&format!("{NOTIFICATIONS}/{id}/read"), &json!({}))
            .await
    }

    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn mark_all_read(&self) -> Result<CountResponse, ApiError> {
        self.api.put("/notifications/read-all", &json!({})).await
    }

    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn mark_many_read(&self, ids: &[String]) -> Result<CountResponse, ApiError> {
        self.api
            .put("/notifications/read-multiple", &json!({ "ids": ids }))
            .await
    }

    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.api.delete(&format!("{NOTIFICATIONS}/{id}")).await
    }

    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn delete_all(&self) -> Result<CountResponse, ApiError> {
        self.api
            .send_json(ApiRequest::delete(NOTIFICATIONS))
            .await
    }

    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn delete_read(&self) -> Result<CountResponse, ApiError> {
        self.api
            .send_json(ApiRequest::delete("/notifications/read"))
            .await
    }

    /// Admin: notify one user.
    ///
    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn create(&self, data: &CreateNotificationData) -> Result<Notification, ApiError> {
        self.api.post(NOTIFICATIONS, data).await
    }

    /// Admin: notify many users at once.
    ///
    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn create_bulk(&self, data: &CreateBulkNotificationData) -> Result<CountResponse, ApiError> {
        self.api.post("/notifications/bulk", data).await
    }
}
