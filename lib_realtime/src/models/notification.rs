//! # Notification Model
//!
//! A notification is created server-side and reaches the client either as a
//! push (`notification` socket event) or inside a pulled page. The `id` is the
//! join key between both sources.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque, server-assigned notification identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NotificationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// The enumerated notification tag. Tags this client does not know are kept
/// as [`NotificationType::Other`] rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Application,
    ApplicationStatus,
    Interview,
    Message,
    Internship,
    Recommendation,
    System,
    #[serde(other)]
    Other,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Application => "application",
            NotificationType::ApplicationStatus => "application_status",
            NotificationType::Interview => "interview",
            NotificationType::Message => "message",
            NotificationType::Internship => "internship",
            NotificationType::Recommendation => "recommendation",
            NotificationType::System => "system",
            NotificationType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

/// Optional structured payload; `actionUrl` is the deep link the UI follows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// # Notification
///
/// `read` only ever moves from `false` to `true` on the client, except when a
/// failed optimistic mutation is rolled back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(alias = "_id")]
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, alias = "isRead")]
    pub read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<NotificationData>,
}

impl Notification {
    /// Parses a notification out of an arbitrary JSON payload, rejecting
    /// records that deserialize but carry an empty id.
    pub fn from_value(value: Value) -> Result<Self, String> {
        let notification: Notification = serde_json::from_value(value).map_err(|e| e.to_string())?;
        if notification.id.as_str().trim().is_empty() {
            return Err("notification id is empty".to_string());
        }
        Ok(notification)
    }

    pub fn action_url(&self) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.action_url.as_deref())
    }
}

/// One page of a notification pull.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub page: u32,
    pub total_pages: u32,
    pub total: u64,
    /// Unread count as reported by the server, when the endpoint includes it.
    pub unread_count: Option<u64>,
}

impl NotificationPage {
    pub fn has_more(&self) -> bool {
        self.page < self.total_pages
    }
}
