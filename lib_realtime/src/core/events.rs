//! # Typed Events
//!
//! Inbound socket events are decoded into [`RealtimeEvent`] variants; the
//! registry keys listeners by [`EventKind`]. Outbound events the client may
//! emit are modelled by [`OutboundEvent`].

use std::fmt;

use serde_json::{json, Value};

use crate::core::connection_manager::ConnectionFailure;
use crate::core::transport::DisconnectReason;
use crate::models::{ActivityItem, ChatMessage, Notification};

/// Registry key. Server event names map onto the named variants; anything
/// else is carried as [`EventKind::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Notification,
    NewMessage,
    CompanyActivity,
    InternshipCreated,
    /// Local: the link confirmed open.
    Connected,
    /// Local: the live link dropped.
    Disconnected,
    /// Local: the connection manager gave up or was rejected by the server.
    ConnectError,
    Custom(String),
}

impl EventKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "notification" => EventKind::Notification,
            "new_message" => EventKind::NewMessage,
            "company_activity" => EventKind::CompanyActivity,
            "internship:created" => EventKind::InternshipCreated,
            "connect" => EventKind::Connected,
            "disconnect" => EventKind::Disconnected,
            "connect_error" => EventKind::ConnectError,
            other => EventKind::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Notification => "notification",
            EventKind::NewMessage => "new_message",
            EventKind::CompanyActivity => "company_activity",
            EventKind::InternshipCreated => "internship:created",
            EventKind::Connected => "connect",
            EventKind::Disconnected => "disconnect",
            EventKind::ConnectError => "connect_error",
            EventKind::Custom(name) => name,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded inbound event, or a locally synthesized connection event.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    Notification(Notification),
    NewMessage(ChatMessage),
    CompanyActivity(ActivityItem),
    InternshipCreated(ActivityItem),
    Connected,
    Disconnected(DisconnectReason),
    ConnectError(ConnectionFailure),
    Custom { name: String, data: Value },
}

impl RealtimeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            RealtimeEvent::Notification(_) => EventKind::Notification,
            RealtimeEvent::NewMessage(_) => EventKind::NewMessage,
            RealtimeEvent::CompanyActivity(_) => EventKind::CompanyActivity,
            RealtimeEvent::InternshipCreated(_) => EventKind::InternshipCreated,
            RealtimeEvent::Connected => EventKind::Connected,
            RealtimeEvent::Disconnected(_) => EventKind::Disconnected,
            RealtimeEvent::ConnectError(_) => EventKind::ConnectError,
            RealtimeEvent::Custom { name, .. } => EventKind::Custom(name.clone()),
        }
    }
}

/// Events this client emits over the live channel.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    JoinConversation { conversation_id: String },
    LeaveConversation { conversation_id: String },
    Typing { conversation_id: String, is_typing: bool },
    MessageRead { conversation_id: String, message_id: String },
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::JoinConversation { .. } => "join_conversation",
            OutboundEvent::LeaveConversation { .. } => "leave_conversation",
            OutboundEvent::Typing { .. } => "typing",
            OutboundEvent::MessageRead { .. } => "message_read",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            OutboundEvent::JoinConversation { conversation_id }
            | OutboundEvent::LeaveConversation { conversation_id } => {
                json!({ "conversationId": conversation_id })
            }
            OutboundEvent::Typing { conversation_id, is_typing } => {
                json!({ "conversationId": conversation_id, "isTyping": is_typing })
            }
            OutboundEvent::MessageRead { conversation_id, message_id } => {
                json!({ "conversationId": conversation_id, "messageId": message_id })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_kind() {
        for name in ["notification", "new_message", "company_activity", "internship:created", "profile_viewed"] {
            assert_eq!(EventKind::from_name(name).as_str(), name);
        }
        assert_eq!(EventKind::from_name("profile_viewed"), EventKind::Custom("profile_viewed".into()));
    }

    #[test]
    fn typing_payload_uses_server_field_names() {
        let event = OutboundEvent::Typing { conversation_id: "c1".into(), is_typing: true };
        assert_eq!(event.name(), "typing");
        assert_eq!(event.payload(), json!({ "conversationId": "c1", "isTyping": true }));
    }
}
