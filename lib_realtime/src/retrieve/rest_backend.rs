//! # Marketplace REST Backend
//!
//! [`NotificationBackend`] and [`MessagingBackend`] over the marketplace's
//! REST API. Responses are accepted either bare or wrapped in the server's
//! `{ "success": true, "data": ... }` envelope. Items of a pulled notification
//! page that fail validation are dropped with a warning; the rest of the page
//! is still used.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::core::transport::Credential;
use crate::models::{ChatMessage, Conversation, Notification, NotificationId, NotificationPage};
use crate::retrieve::backend::{ApiError, MessagingBackend, NotificationBackend, NotificationQuery};
use crate::retrieve::ky_http::{ApiClient, ApiResponse};

pub struct RestBackend {
    client: ApiClient,
}

impl RestBackend {
    pub fn new(api_base_url: &str, credential: &Credential) -> anyhow::Result<Self> {
        Ok(Self { client: ApiClient::new(api_base_url, Some(credential.expose().to_string()))? })
    }

    pub fn from_client(client: ApiClient) -> Self {
        Self { client }
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let response: ApiResponse<Value> = self.client.request(method, path, query, body).await.map_err(|e| {
            if e.downcast_ref::<serde_json::Error>().is_some() {
                ApiError::Decode(format!("{e:#}"))
            } else {
                ApiError::Network(format!("{e:#}"))
            }
        })?;

        if !response.success {
            let message = response.error_message();
            log::warn!("{} rejected with {}: {}", path, response.status, message);
            return Err(ApiError::Rejected { status: response.status, message });
        }
        Ok(response.data.unwrap_or(Value::Null))
    }
}

/// Strips the `{ success, data }` envelope when present.
fn payload(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("data") => map.remove("data").unwrap_or(Value::Null),
        other => other,
    }
}

fn decode<T: DeserializeOwned>(value: Value, what: &str) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Decode(format!("{what}: {e}")))
}

/// The array under `key`, or the value itself when it already is an array.
fn list(value: Value, key: &str) -> Result<Vec<Value>, ApiError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(ApiError::Decode(format!("expected an array under '{key}'"))),
        },
        _ => Err(ApiError::Decode(format!("expected an array under '{key}'"))),
    }
}

/// The object under `key` when it is one, otherwise the value itself.
fn single(value: Value, key: &str) -> Value {
    match value {
        Value::Object(mut map) if map.get(key).is_some_and(Value::is_object) => map.remove(key).unwrap_or(Value::Null),
        other => other,
    }
}

fn as_u32(value: Option<&Value>) -> Option<u32> {
    value.and_then(Value::as_u64).map(|n| u32::try_from(n).unwrap_or(u32::MAX))
}

fn notification_page(value: Value, requested: u32) -> Result<NotificationPage, ApiError> {
    let body = payload(value);
    let pagination = body.get("pagination").cloned().unwrap_or(Value::Null);
    let unread_count = body.get("unreadCount").and_then(Value::as_u64);

    let mut notifications = Vec::new();
    for item in list(body, "notifications")? {
        match Notification::from_value(item) {
            Ok(n) => notifications.push(n),
            Err(e) => log::warn!("Dropping malformed notification from page {}: {}", requested, e),
        }
    }

    let page = as_u32(pagination.get("page")).unwrap_or(requested);
    let total_pages = as_u32(pagination.get("pages").or_else(|| pagination.get("totalPages"))).unwrap_or(page);
    let total = pagination.get("total").and_then(Value::as_u64).unwrap_or(notifications.len() as u64);

    Ok(NotificationPage { notifications, page, total_pages, total, unread_count })
}

fn unread_count(value: Value) -> Result<u64, ApiError> {
    let body = payload(value);
    body.as_u64()
        .or_else(|| body.get("count").and_then(Value::as_u64))
        .or_else(|| body.get("unreadCount").and_then(Value::as_u64))
        .ok_or_else(|| ApiError::Decode("unread count missing".into()))
}

impl NotificationBackend for RestBackend {
    async fn fetch_notifications(&self, query: &NotificationQuery) -> Result<NotificationPage, ApiError> {
        let value = self.call(Method::GET, "notifications", &query.to_pairs(), None).await?;
        notification_page(value, query.page)
    }

    async fn fetch_unread_count(&self) -> Result<u64, ApiError> {
        let value = self.call(Method::GET, "notifications/unread-count", &[], None).await?;
        unread_count(value)
    }

    async fn mark_read(&self, id: &NotificationId) -> Result<(), ApiError> {
        self.call(Method::PUT, &format!("notifications/{id}/read"), &[], None).await.map(drop)
    }

    async fn mark_all_read(&self) -> Result<(), ApiError> {
        self.call(Method::PUT, "notifications/read-all", &[], None).await.map(drop)
    }

    async fn delete(&self, id: &NotificationId) -> Result<(), ApiError> {
        self.call(Method::DELETE, &format!("notifications/{id}"), &[], None).await.map(drop)
    }

    async fn delete_many(&self, ids: &[NotificationId]) -> Result<(), ApiError> {
        let body = json!({ "ids": ids });
        self.call(Method::DELETE, "notifications/bulk", &[], Some(&body)).await.map(drop)
    }
}

impl MessagingBackend for RestBackend {
    async fn fetch_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        let value = self.call(Method::GET, "messages/conversations", &[], None).await?;
        list(payload(value), "conversations")?
            .into_iter()
            .map(|item| decode(item, "conversation"))
            .collect()
    }

    async fn create_conversation(&self, participant_id: &str) -> Result<Conversation, ApiError> {
        let body = json!({ "participantId": participant_id });
        let value = self.call(Method::POST, "messages/conversations", &[], Some(&body)).await?;
        decode(single(payload(value), "conversation"), "conversation")
    }

    async fn fetch_messages(&self, conversation_id: &str) -> Result<Vec<ChatMessage>, ApiError> {
        let path = format!("messages/conversations/{conversation_id}");
        let value = self.call(Method::GET, &path, &[], None).await?;
        list(payload(value), "messages")?
            .into_iter()
            .map(|item| decode(item, "message"))
            .collect()
    }

    async fn send_message(&self, conversation_id: &str, content: &str) -> Result<ChatMessage, ApiError> {
        let path = format!("messages/conversations/{conversation_id}");
        let body = json!({ "content": content });
        let value = self.call(Method::POST, &path, &[], Some(&body)).await?;
        decode(single(payload(value), "message"), "message")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> Value {
        json!({
            "_id": id,
            "type": "system",
            "title": "t",
            "message": "m",
            "createdAt": "2026-10-01T09:30:00Z"
        })
    }

    #[test]
    fn page_is_read_from_the_envelope() {
        let value = json!({
            "success": true,
            "data": {
                "notifications": [item("a"), item("b")],
                "pagination": { "page": 1, "limit": 2, "total": 5, "pages": 3 },
                "unreadCount": 4
            }
        });
        let page = notification_page(value, 1).unwrap();
        assert_eq!(page.notifications.len(), 2);
        assert_eq!((page.page, page.total_pages, page.total), (1, 3, 5));
        assert_eq!(page.unread_count, Some(4));
        assert!(page.has_more());
    }

    #[test]
    fn malformed_items_are_dropped_not_fatal() {
        let value = json!({ "notifications": [item("a"), { "_id": "broken" }, item("")] });
        let page = notification_page(value, 2).unwrap();
        assert_eq!(page.notifications.len(), 1);
        assert_eq!(page.page, 2);
        assert!(!page.has_more());
    }

    #[test]
    fn unread_count_accepts_known_shapes() {
        assert_eq!(unread_count(json!({ "data": { "count": 7 } })), Ok(7));
        assert_eq!(unread_count(json!({ "unreadCount": 3 })), Ok(3));
        assert!(unread_count(json!({})).is_err());
    }

    #[test]
    fn message_wrapper_is_unwrapped_but_error_text_is_not_mistaken_for_it() {
        let wrapped = json!({ "message": { "_id": "m1" } });
        assert_eq!(single(wrapped, "message"), json!({ "_id": "m1" }));
        let bare = json!({ "_id": "m1", "message": "hello" });
        assert_eq!(single(bare.clone(), "message"), bare);
    }
}
