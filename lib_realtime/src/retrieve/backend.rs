use std::future::Future;

use thiserror::Error;

use crate::models::{ChatMessage, Conversation, NotificationId, NotificationPage, NotificationType, Priority};

/// Failure of a REST call. `Rejected` carries the server's own error message
/// and displays it verbatim, so it can be shown to the user as-is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Parameters of a notification page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationQuery {
    /// 1-based.
    pub page: u32,
    pub limit: u32,
    pub kind: Option<NotificationType>,
    pub priority: Option<Priority>,
    pub unread_only: bool,
}

impl NotificationQuery {
    pub fn first_page(limit: u32) -> Self {
        Self { page: 1, limit, kind: None, priority: None, unread_only: false }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    /// Query-string pairs, in the parameter names the server expects.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("page", self.page.to_string()), ("limit", self.limit.to_string())];
        if let Some(kind) = self.kind {
            pairs.push(("type", kind.as_str().to_string()));
        }
        if let Some(priority) = self.priority {
            pairs.push(("priority", priority.as_str().to_string()));
        }
        if self.unread_only {
            pairs.push(("unreadOnly", "true".to_string()));
        }
        pairs
    }
}

/// Notification endpoints the synchronizer depends on.
pub trait NotificationBackend: Send + Sync + 'static {
    fn fetch_notifications(
        &self,
        query: &NotificationQuery,
    ) -> impl Future<Output = Result<NotificationPage, ApiError>> + Send;

    fn fetch_unread_count(&self) -> impl Future<Output = Result<u64, ApiError>> + Send;

    fn mark_read(&self, id: &NotificationId) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn mark_all_read(&self) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn delete(&self, id: &NotificationId) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn delete_many(&self, ids: &[NotificationId]) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// Messaging endpoints used by the conversation view.
pub trait MessagingBackend: Send + Sync + 'static {
    fn fetch_conversations(&self) -> impl Future<Output = Result<Vec<Conversation>, ApiError>> + Send;

    fn create_conversation(&self, participant_id: &str) -> impl Future<Output = Result<Conversation, ApiError>> + Send;

    fn fetch_messages(&self, conversation_id: &str) -> impl Future<Output = Result<Vec<ChatMessage>, ApiError>> + Send;

    fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
    ) -> impl Future<Output = Result<ChatMessage, ApiError>> + Send;
}
