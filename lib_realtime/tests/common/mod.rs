//! Shared fixtures: a scripted in-memory connector and in-memory REST
//! backends.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use futures_util::future::BoxFuture;
use lib_realtime::models::{ChatMessage, Conversation, NotificationPage};
use lib_realtime::{
    ApiError, Connector, Credential, Frame, Link, LinkEvent, MessagingBackend, Notification, NotificationBackend,
    NotificationId, NotificationQuery, NotificationType, Priority, RealtimeConfig, TransportError,
};
use tokio::sync::mpsc;

pub fn config() -> RealtimeConfig {
    RealtimeConfig { reconnect_jitter: 0.0, ..RealtimeConfig::default() }
}

pub fn note(id: &str, minute: u32, read: bool) -> Notification {
    Notification {
        id: NotificationId::new(id),
        kind: NotificationType::Application,
        title: format!("Notification {id}"),
        message: "body".into(),
        priority: Priority::Medium,
        read,
        created_at: Utc.with_ymd_and_hms(2026, 10, 18, 9, minute, 0).unwrap(),
        data: None,
    }
}

pub fn id(s: &str) -> NotificationId {
    NotificationId::new(s)
}

/// What the next `connect` call does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Accept,
    Fail,
    Unauthorized,
    /// Never completes; the manager's timeout has to fire.
    Hang,
}

/// The far end of an accepted link, as seen by a test.
pub struct ServerSide {
    pub from_client: mpsc::UnboundedReceiver<Frame>,
    pub to_client: mpsc::UnboundedSender<LinkEvent>,
}

impl ServerSide {
    pub fn push(&self, event: &str, data: serde_json::Value) {
        self.to_client.send(LinkEvent::Frame(Frame::new(event, data))).unwrap();
    }

    pub fn close(&self, reason: lib_realtime::DisconnectReason) {
        self.to_client.send(LinkEvent::Closed(reason)).unwrap();
    }
}

pub struct ScriptedConnector {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: AtomicUsize,
    credentials: Mutex<Vec<String>>,
    servers: mpsc::UnboundedSender<ServerSide>,
}

impl ScriptedConnector {
    /// Steps run in order; once exhausted every call does `fallback`.
    pub fn new(script: &[Step], fallback: Step) -> (Arc<Self>, mpsc::UnboundedReceiver<ServerSide>) {
        let (servers, accepted) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            script: Mutex::new(script.iter().copied().collect()),
            fallback,
            calls: AtomicUsize::new(0),
            credentials: Mutex::new(Vec::new()),
            servers,
        });
        (connector, accepted)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn credentials(&self) -> Vec<String> {
        self.credentials.lock().unwrap().clone()
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self, credential: &Credential) -> BoxFuture<'static, Result<Link, TransportError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.credentials.lock().unwrap().push(credential.expose().to_string());
        let step = self.script.lock().unwrap().pop_front().unwrap_or(self.fallback);

        match step {
            Step::Accept => {
                let (outbound, from_client) = mpsc::unbounded_channel();
                let (to_client, inbound) = mpsc::unbounded_channel();
                let _ = self.servers.send(ServerSide { from_client, to_client });
                Box::pin(async move { Ok(Link { outbound, inbound }) })
            }
            Step::Fail => Box::pin(async { Err(TransportError::Handshake("connection refused".into())) }),
            Step::Unauthorized => Box::pin(async { Err(TransportError::Unauthorized("HTTP 401".into())) }),
            Step::Hang => Box::pin(std::future::pending()),
        }
    }
}

fn rejected() -> ApiError {
    ApiError::Rejected { status: 503, message: "Service temporarily unavailable".into() }
}

/// Server-side notification list with switchable failures.
#[derive(Default)]
pub struct MemoryBackend {
    pub notifications: Mutex<Vec<Notification>>,
    pub fail_mutations: AtomicBool,
    pub fail_pulls: AtomicBool,
    pub pulls: AtomicUsize,
    pub calls: Mutex<Vec<String>>,
}

impl MemoryBackend {
    pub fn with(notifications: Vec<Notification>) -> Arc<Self> {
        let backend = Self::default();
        *backend.notifications.lock().unwrap() = notifications;
        Arc::new(backend)
    }

    pub fn set_read_on_server(&self, id: &str) {
        for n in self.notifications.lock().unwrap().iter_mut() {
            if n.id.as_str() == id {
                n.read = true;
            }
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(call);
        if self.fail_mutations.load(Ordering::SeqCst) {
            Err(rejected())
        } else {
            Ok(())
        }
    }
}

impl NotificationBackend for MemoryBackend {
    async fn fetch_notifications(&self, query: &NotificationQuery) -> Result<NotificationPage, ApiError> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        if self.fail_pulls.load(Ordering::SeqCst) {
            return Err(ApiError::Network("connection reset".into()));
        }

        let mut matching: Vec<Notification> = self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| query.kind.map_or(true, |k| n.kind == k))
            .filter(|n| query.priority.map_or(true, |p| n.priority == p))
            .filter(|n| !query.unread_only || !n.read)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let limit = query.limit.max(1) as usize;
        let total = matching.len();
        let total_pages = total.div_ceil(limit).max(1) as u32;
        let start = (query.page.max(1) as usize - 1) * limit;
        let notifications = matching.into_iter().skip(start).take(limit).collect();

        Ok(NotificationPage { notifications, page: query.page, total_pages, total: total as u64, unread_count: None })
    }

    async fn fetch_unread_count(&self) -> Result<u64, ApiError> {
        Ok(self.notifications.lock().unwrap().iter().filter(|n| !n.read).count() as u64)
    }

    async fn mark_read(&self, id: &NotificationId) -> Result<(), ApiError> {
        self.record(format!("mark_read {id}"))?;
        self.set_read_on_server(id.as_str());
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<(), ApiError> {
        self.record("mark_all_read".into())?;
        for n in self.notifications.lock().unwrap().iter_mut() {
            n.read = true;
        }
        Ok(())
    }

    async fn delete(&self, id: &NotificationId) -> Result<(), ApiError> {
        self.record(format!("delete {id}"))?;
        self.notifications.lock().unwrap().retain(|n| &n.id != id);
        Ok(())
    }

    async fn delete_many(&self, ids: &[NotificationId]) -> Result<(), ApiError> {
        self.record(format!("delete_many {}", ids.len()))?;
        self.notifications.lock().unwrap().retain(|n| !ids.contains(&n.id));
        Ok(())
    }
}

/// Chat backend that stamps sent messages with sequential ids.
#[derive(Default)]
pub struct MemoryMessaging {
    pub history: Mutex<Vec<ChatMessage>>,
    pub fail_sends: AtomicBool,
    sent: AtomicUsize,
}

pub fn chat(id: &str, conversation: &str, sender: &str, second: u32) -> ChatMessage {
    ChatMessage {
        id: id.into(),
        conversation_id: conversation.into(),
        sender: sender.into(),
        content: format!("message {id}"),
        created_at: Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, second).unwrap(),
        read: false,
    }
}

impl MessagingBackend for MemoryMessaging {
    async fn fetch_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        Ok(vec![Conversation { id: "c1".into(), participants: vec!["u1".into(), "u2".into()], last_message: None, unread_count: 0 }])
    }

    async fn create_conversation(&self, participant_id: &str) -> Result<Conversation, ApiError> {
        Ok(Conversation { id: format!("with-{participant_id}"), participants: vec![participant_id.into()], last_message: None, unread_count: 0 })
    }

    async fn fetch_messages(&self, conversation_id: &str) -> Result<Vec<ChatMessage>, ApiError> {
        Ok(self.history.lock().unwrap().iter().filter(|m| m.conversation_id == conversation_id).cloned().collect())
    }

    async fn send_message(&self, conversation_id: &str, content: &str) -> Result<ChatMessage, ApiError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(rejected());
        }
        let n = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
        let mut message = chat(&format!("srv-{n}"), conversation_id, "u1", 30);
        message.content = content.to_string();
        Ok(message)
    }
}
