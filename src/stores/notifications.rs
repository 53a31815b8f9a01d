//! Notification inbox state.
//!
//! Mutations are confirmed by the server first, then applied to the cached
//! list locally (mark read, delete) so the view does not need a refetch.
//! The unread counter is kept in step and never goes below zero.

use std::sync::{PoisonError, RwLock};

use chrono::Utc;
use tracing::debug;

use crate::error::{ActionError, ActionResult};
use crate::http::ApiError;
use crate::models::Pagination;
use crate::models::notification::{
    CountResponse, CreateBulkNotificationData, CreateNotificationData, Notification, NotificationCount,
    NotificationListParams, NotificationPage,
};
use crate::services::NotificationService;

const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationState {
    pub notifications: Vec<Notification>,
    pub current: Option<Notification>,
    pub unread_count: u64,
    pub total_count: u64,
    pub loading: bool,
    pub error: Option<String>,
    pub pagination: Pagination,
}

impl Default for NotificationState {
    fn default() -> Self {
        Self {
            notifications: Vec::new(),
            current: None,
            unread_count: 0,
            total_count: 0,
            loading: false,
            error: None,
            pagination: Pagination::with_limit(DEFAULT_PAGE_SIZE),
        }
    }
}

pub struct NotificationStore {
    service: NotificationService,
    state: RwLock<NotificationState>,
}

impl NotificationStore {
    #[must_use]
    pub fn new(service: NotificationService) -> Self {
        Self { service, state: RwLock::new(NotificationState::default()) }
    }

    #[must_use]
    pub fn snapshot(&self) -> NotificationState {
        self.read(Clone::clone)
    }

    #[must_use]
    pub fn has_unread(&self) -> bool {
        self.read(|s| s.unread_count > 0)
    }

    #[must_use]
    pub fn unread(&self) -> Vec<Notification> {
        self.read(|s| s.notifications.iter().filter(|n| !n.read).cloned().collect())
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Notification> {
        self.read(|s| s.notifications.iter().find(|n| n.id == id).cloned())
    }

    /// # Errors
    ///
    /// Server message or "Failed to fetch notifications".
    pub async fn fetch(&self, params: &NotificationListParams) -> ActionResult<NotificationPage> {
        self.begin();
        let result = self.service.list(params).await;
        self.finish(result, "Failed to fetch notifications", |s, page| {
            s.notifications.clone_from(&page.page.data);
            s.unread_count = page.unread_count;
            s.pagination = page.page.pagination();
        })
    }

    /// # Errors
    ///
    /// Server message or "Failed to fetch notification count".
    pub async fn fetch_count(&self) -> ActionResult<NotificationCount> {
        let result = self.service.count().await;
        self.settle(result, "Failed to fetch notification count", |s, count| {
            s.unread_count = count.unread;
            s.total_count = count.total;
        })
    }

    /// # Errors
    ///
    /// Server message or "Failed to fetch notification".
    pub async fn fetch_by_id(&self, id: &str) -> ActionResult<Notification> {
        self.begin();
        let result = self.service.get(id).await;
        self.finish(result, "Failed to fetch notification", |s, n| s.current = Some(n.clone()))
    }

    /// # Errors
    ///
    /// Server message or "Failed to mark notification as read".
    pub async fn mark_read(&self, id: &str) -> ActionResult<Notification> {
        let result = self.service.mark_read(id).await;
        self.settle(result, "Failed to mark notification as read", |s, updated| {
            if let Some(slot) = s.notifications.iter_mut().find(|n| n.id == updated.id) {
                *slot = updated.clone();
            }
            s.unread_count = s.unread_count.saturating_sub(1);
        })
    }

    /// # Errors
    ///
    /// Server message or "Failed to mark all as read".
    pub async fn mark_all_read(&self) -> ActionResult<CountResponse> {
        let result = self.service.mark_all_read().await;
        self.settle(result, "Failed to mark all as read", |s, _| {
            let now = Utc::now().to_rfc3339();
            for n in &mut s.notifications {
                n.read = true;
                n.read_at = Some(now.clone());
            }
            s.unread_count = 0;
        })
    }

    /// Mark `ids` read, then refetch the counters from the server.
    ///
    /// # Errors
    ///
    /// Server message or "Failed to mark notifications as read".
    pub async fn mark_many_read(&self, ids: &[String]) -> ActionResult<CountResponse> {
        let result = self.service.mark_many_read(ids).await;
        let marked = self.settle(result, "Failed to mark notifications as read", |s, _| {
            let now = Utc::now().to_rfc3339();
            for n in s.notifications.iter_mut().filter(|n| ids.contains(&n.id)) {
                n.read = true;
                n.read_at = Some(now.clone());
            }
        })?;
        if let Err(e) = self.fetch_count().await {
            debug!(error = %e, "count refresh after bulk read failed");
        }
        Ok(marked)
    }

    /// # Errors
    ///
    /// Server message or "Failed to delete notification".
    pub async fn delete(&self, id: &str) -> ActionResult {
        let result = self.service.delete(id).await;
        self.settle(result, "Failed to delete notification", |s, _| {
            let Some(pos) = s.notifications.iter().position(|n| n.id == id) else {
                return;
            };
            let removed = s.notifications.remove(pos);
            if !removed.read {
                s.unread_count = s.unread_count.saturating_sub(1);
            }
        })
    }

    /// # Errors
    ///
    /// Server message or "Failed to delete all notifications".
    pub async fn delete_all(&self) -> ActionResult<CountResponse> {
        let result = self.service.delete_all().await;
        self.settle(result, "Failed to delete all notifications", |s, _| {
            s.notifications.clear();
            s.unread_count = 0;
            s.total_count = 0;
        })
    }

    /// # Errors
    ///
    /// Server message or "Failed to delete read notifications".
    pub async fn delete_read(&self) -> ActionResult<CountResponse> {
        let result = self.service.delete_read().await;
        self.settle(result, "Failed to delete read notifications", |s, _| {
            s.notifications.retain(|n| !n.read);
        })
    }

    /// # Errors
    ///
    /// Server message or "Failed to create notification".
    pub async fn create(&self, data: &CreateNotificationData) -> ActionResult<Notification> {
        self.begin();
        let result = self.service.create(data).await;
        self.finish(result, "Failed to create notification", |_, _| {})
    }

    /// # Errors
    ///
    /// Server message or "Failed to create bulk notifications".
    pub async fn create_bulk(&self, data: &CreateBulkNotificationData) -> ActionResult<CountResponse> {
        self.begin();
        let result = self.service.create_bulk(data).await;
        self.finish(result, "Failed to create bulk notifications", |_, _| {})
    }

    pub fn clear_error(&self) {
        self.mutate(|s| s.error = None);
    }

    pub fn clear_current(&self) {
        self.mutate(|s| s.current = None);
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn read<R>(&self, f: impl FnOnce(&NotificationState) -> R) -> R {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut NotificationState) -> R) -> R {
        f(&mut self.state.write().unwrap_or_else(PoisonError::into_inner))
    }

    fn begin(&self) {
        self.mutate(|s| {
            s.loading = true;
            s.error = None;
        });
    }

    /// `settle` for actions that toggled `loading`.
    fn finish<T>(
        &self,
        result: Result<T, ApiError>,
        fallback: &str,
        apply: impl FnOnce(&mut NotificationState, &T),
    ) -> ActionResult<T> {
        let settled = self.settle(result, fallback, apply);
        self.mutate(|s| s.loading = false);
        settled
    }

    /// Apply a confirmed result, or record the failure message.
    fn settle<T>(
        &self,
        result: Result<T, ApiError>,
        fallback: &str,
        apply: impl FnOnce(&mut NotificationState, &T),
    ) -> ActionResult<T> {
        match result {
            Ok(value) => {
                self.mutate(|s| apply(s, &value));
                Ok(value)
            }
            Err(e) => {
                let err = ActionError::from_api(&e, fallback);
                self.mutate(|s| s.error = Some(err.message.clone()));
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "notifications_test.rs"]
mod tests;
