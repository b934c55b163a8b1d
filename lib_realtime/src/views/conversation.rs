//! # Conversation View
//!
//! One open chat room at a time. Opening a room joins it on the live channel
//! (leaving the previous one) and loads its history over REST; `new_message`
//! pushes for the open room are appended, pushes for other rooms only bump
//! their unread counters. Sending is optimistic: the message shows as
//! `Sending` until the server's copy replaces it.
//!
//! Room membership belongs to the socket, so the open room is joined again
//! after every reconnect. Dropping the view unsubscribes its listeners.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use thiserror::Error;

use crate::core::connection_manager::{ConnectionHandle, EmitOutcome};
use crate::core::events::{EventKind, OutboundEvent, RealtimeEvent};
use crate::core::registry::{EventRegistry, Subscription};
use crate::models::{ChatMessage, Conversation};
use crate::retrieve::backend::{ApiError, MessagingBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sending,
    Delivered,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayMessage {
    pub message: ChatMessage,
    pub delivery: Delivery,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversationError {
    #[error("no conversation is open")]
    NotOpen,

    #[error("message is empty")]
    EmptyMessage,

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Default)]
struct ConversationState {
    open: Option<String>,
    messages: Vec<DisplayMessage>,
    unread: HashMap<String, u32>,
    next_local: u64,
}

impl ConversationState {
    /// Inserts in `created_at` order, ahead of messages still sending.
    /// Returns `false` for a duplicate id.
    fn insert_delivered(&mut self, message: ChatMessage) -> bool {
        if self.messages.iter().any(|m| m.message.id == message.id) {
            return false;
        }
        let at = self
            .messages
            .iter()
            .position(|m| m.delivery == Delivery::Sending || m.message.created_at > message.created_at)
            .unwrap_or(self.messages.len());
        self.messages.insert(at, DisplayMessage { message, delivery: Delivery::Delivered });
        true
    }
}

pub struct ConversationView<M> {
    backend: Arc<M>,
    connection: ConnectionHandle,
    self_id: String,
    state: Arc<Mutex<ConversationState>>,
    subscriptions: Vec<Subscription>,
}

impl<M: MessagingBackend> ConversationView<M> {
    /// `self_id` is the signed-in user's id; own messages never count as
    /// unread.
    pub fn attach(
        registry: &EventRegistry,
        connection: ConnectionHandle,
        backend: Arc<M>,
        self_id: impl Into<String>,
    ) -> Self {
        let self_id = self_id.into();
        let state = Arc::new(Mutex::new(ConversationState::default()));

        let on_message = {
            let state = Arc::clone(&state);
            let self_id = self_id.clone();
            registry.on(EventKind::NewMessage, move |event| {
                let RealtimeEvent::NewMessage(message) = event else {
                    return Ok(());
                };
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                if state.open.as_deref() == Some(message.conversation_id.as_str()) {
                    state.insert_delivered(message.clone());
                } else if message.sender != self_id {
                    *state.unread.entry(message.conversation_id.clone()).or_default() += 1;
                }
                Ok(())
            })
        };

        let on_connected = {
            let state = Arc::clone(&state);
            let connection = connection.clone();
            registry.on(EventKind::Connected, move |_| {
                let open = state.lock().unwrap_or_else(PoisonError::into_inner).open.clone();
                if let Some(conversation_id) = open {
                    // May repeat a join that was flushed from the offline queue.
                    connection.emit_detached(&OutboundEvent::JoinConversation { conversation_id });
                }
                Ok(())
            })
        };

        Self { backend, connection, self_id, state, subscriptions: vec![on_message, on_connected] }
    }

    fn lock(&self) -> MutexGuard<'_, ConversationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        self.backend.fetch_conversations().await
    }

    pub async fn start_conversation(&self, participant_id: &str) -> Result<Conversation, ApiError> {
        self.backend.create_conversation(participant_id).await
    }

    /// Switches to `conversation_id` and loads its history. The room stays
    /// open (and keeps receiving pushes) even if the history fetch fails.
    pub async fn open(&self, conversation_id: &str) -> Result<(), ConversationError> {
        let previous = {
            let mut state = self.lock();
            let previous = state.open.replace(conversation_id.to_string());
            if previous.as_deref() != Some(conversation_id) {
                state.messages.clear();
            }
            state.unread.remove(conversation_id);
            previous
        };

        if previous.as_deref() != Some(conversation_id) {
            if let Some(previous) = previous {
                self.connection.emit_event(&OutboundEvent::LeaveConversation { conversation_id: previous }).await;
            }
            self.connection
                .emit_event(&OutboundEvent::JoinConversation { conversation_id: conversation_id.to_string() })
                .await;
        }

        let history = self.backend.fetch_messages(conversation_id).await.map_err(|e| {
            log::warn!("Could not load conversation {}: {}", conversation_id, e);
            e
        })?;

        let mut state = self.lock();
        if state.open.as_deref() == Some(conversation_id) {
            for message in history {
                state.insert_delivered(message);
            }
        }
        Ok(())
    }

    /// Leaves the open room, if any.
    pub async fn close(&self) {
        let previous = {
            let mut state = self.lock();
            state.messages.clear();
            state.open.take()
        };
        if let Some(conversation_id) = previous {
            self.connection.emit_event(&OutboundEvent::LeaveConversation { conversation_id }).await;
        }
    }

    pub fn open_conversation(&self) -> Option<String> {
        self.lock().open.clone()
    }

    pub fn messages(&self) -> Vec<DisplayMessage> {
        self.lock().messages.clone()
    }

    pub fn unread_for(&self, conversation_id: &str) -> u32 {
        self.lock().unread.get(conversation_id).copied().unwrap_or(0)
    }

    pub async fn send(&self, content: &str) -> Result<ChatMessage, ConversationError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ConversationError::EmptyMessage);
        }

        let (conversation_id, local_id) = {
            let mut state = self.lock();
            let conversation_id = state.open.clone().ok_or(ConversationError::NotOpen)?;
            state.next_local += 1;
            let local_id = format!("local-{}", state.next_local);
            state.messages.push(DisplayMessage {
                message: ChatMessage {
                    id: local_id.clone(),
                    conversation_id: conversation_id.clone(),
                    sender: self.self_id.clone(),
                    content: content.to_string(),
                    created_at: Utc::now(),
                    read: true,
                },
                delivery: Delivery::Sending,
            });
            (conversation_id, local_id)
        };

        let result = self.backend.send_message(&conversation_id, content).await;

        let mut state = self.lock();
        state.messages.retain(|m| m.message.id != local_id);
        match result {
            Ok(message) => {
                if state.open.as_deref() == Some(conversation_id.as_str()) {
                    state.insert_delivered(message.clone());
                }
                Ok(message)
            }
            Err(e) => {
                log::warn!("Message to {} not sent: {}", conversation_id, e);
                Err(e.into())
            }
        }
    }

    pub async fn set_typing(&self, is_typing: bool) -> Result<EmitOutcome, ConversationError> {
        let conversation_id = self.open_conversation().ok_or(ConversationError::NotOpen)?;
        Ok(self.connection.emit_event(&OutboundEvent::Typing { conversation_id, is_typing }).await)
    }

    pub async fn acknowledge(&self, message_id: &str) -> Result<EmitOutcome, ConversationError> {
        let conversation_id = self.open_conversation().ok_or(ConversationError::NotOpen)?;
        let event = OutboundEvent::MessageRead { conversation_id, message_id: message_id.to_string() };
        Ok(self.connection.emit_event(&event).await)
    }

}

impl<M> ConversationView<M> {
    /// Stops listening. Called on drop as well.
    pub fn detach(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
    }
}

impl<M> Drop for ConversationView<M> {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn message(id: &str, second: i64) -> ChatMessage {
        ChatMessage {
            id: id.into(),
            conversation_id: "c1".into(),
            sender: "u2".into(),
            content: "hi".into(),
            created_at: Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap() + Duration::seconds(second),
            read: false,
        }
    }

    #[test]
    fn delivered_messages_are_ordered_and_deduplicated() {
        let mut state = ConversationState::default();
        assert!(state.insert_delivered(message("m2", 2)));
        assert!(state.insert_delivered(message("m1", 1)));
        assert!(!state.insert_delivered(message("m2", 2)));

        let ids: Vec<_> = state.messages.iter().map(|m| m.message.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
    }

    #[test]
    fn sending_messages_stay_last() {
        let mut state = ConversationState::default();
        state.messages.push(DisplayMessage { message: message("local-1", 0), delivery: Delivery::Sending });
        state.insert_delivered(message("m9", 9));
        assert_eq!(state.messages[0].message.id, "m9");
        assert_eq!(state.messages[1].delivery, Delivery::Sending);
    }
}
