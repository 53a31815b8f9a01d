//! Notification DTOs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::page::{ListParams, Page};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    OrderUpdate,
    NewExhibition,
    Newsletter,
    PriceDrop,
    ArtistUpdate,
    EventReminder,
    CommentReply,
    System,
}

impl NotificationType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OrderUpdate => "ORDER_UPDATE",
            Self::NewExhibition => "NEW_EXHIBITION",
            Self::Newsletter => "NEWSLETTER",
            Self::PriceDrop => "PRICE_DROP",
            Self::ArtistUpdate => "ARTIST_UPDATE",
            Self::EventReminder => "EVENT_REMINDER",
            Self::CommentReply => "COMMENT_REPLY",
            Self::System => "SYSTEM",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationData {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBulkNotificationData {
    pub user_ids: Vec<String>,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub kind: Option<NotificationType>,
    pub read: Option<bool>,
}

impl NotificationListParams {
    #[must_use]
    pub fn to_list_params(&self) -> ListParams {
        ListParams { page: self.page, limit: self.limit, ..ListParams::default() }
            .filter_opt("type", self.kind.map(NotificationType::as_str))
            .filter_opt("read", self.read)
    }
}

/// A notification page plus the caller's unread total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPage {
    #[serde(flatten)]
    pub page: Page<Notification>,
    pub unread_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationCount {
    pub total: u64,
    pub unread: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}
