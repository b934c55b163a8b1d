use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single chat message inside a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(alias = "conversation")]
    pub conversation_id: String,
    pub sender: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub last_message: Option<ChatMessage>,
    #[serde(default)]
    pub unread_count: u32,
}
