//! # Connection Manager
//!
//! Owns the single live link to the real-time server. It runs as one tokio
//! task and is driven through a cloneable [`ConnectionHandle`]; every state
//! mutation happens inside that task, so commands, link events and timers are
//! applied one at a time in arrival order.
//!
//! ## State machine
//!
//! ```text
//! Disconnected -> Connecting -> Connected
//! Connected    -> Reconnecting -> Connected        (network drop, recovered)
//! Reconnecting -> Disconnected                     (attempts exhausted)
//! Connected    -> Disconnected                     (explicit or server-initiated)
//! ```
//!
//! A server-initiated close is terminal: nothing reconnects until the caller
//! issues a new `connect`. Network drops, failed handshakes and connect
//! timeouts schedule up to `max_reconnect_attempts` attempts on the backoff
//! curve, each re-using the last credential.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{error::Elapsed, sleep, timeout, Instant, Sleep, Timeout};

use crate::configs::realtime_config::RealtimeConfig;
use crate::core::backoff::Backoff;
use crate::core::dispatcher::dispatch_frame;
use crate::core::events::{OutboundEvent, RealtimeEvent};
use crate::core::pending::PendingEmitQueue;
use crate::core::registry::EventRegistry;
use crate::core::transport::{Connector, Credential, DisconnectReason, Frame, Link, LinkEvent, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Terminal, user-visible connection failures. The two cases need different
/// handling in the UI: the first requires signing in again, the second only a
/// retry later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionFailure {
    DisconnectedByServer { reason: String },
    UnableToConnect { attempts: u32 },
}

impl fmt::Display for ConnectionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionFailure::DisconnectedByServer { reason } => {
                write!(f, "Disconnected by server ({reason}); please sign in again")
            }
            ConnectionFailure::UnableToConnect { attempts } => {
                write!(f, "Unable to connect to the real-time server after {attempts} attempts")
            }
        }
    }
}

/// Snapshot published on every transition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Reconnection attempts made since the link was last open.
    pub attempt_count: u32,
    pub pending_emits: usize,
    pub failure: Option<ConnectionFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// A connection attempt was started.
    Started,
    /// The link is already open; nothing changed.
    AlreadyConnected,
    /// An attempt or reconnection cycle is already running.
    InProgress,
    /// Dropped: too soon after the previous attempt.
    Throttled,
    /// Dropped: empty credential.
    MissingCredential,
    /// The manager task is gone.
    ShutDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    Sent,
    /// Buffered until the next successful open.
    Queued,
    ShutDown,
}

enum Command {
    Connect { credential: String, reply: oneshot::Sender<ConnectOutcome> },
    Disconnect { reply: oneshot::Sender<()> },
    Emit { event: String, payload: Value, reply: oneshot::Sender<EmitOutcome> },
    Shutdown { reply: oneshot::Sender<()> },
}

type Attempt = Pin<Box<Timeout<BoxFuture<'static, Result<Link, TransportError>>>>>;

/// Cloneable front of the connection manager task.
#[derive(Clone)]
pub struct ConnectionHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
}

impl ConnectionHandle {
    pub async fn connect(&self, credential: impl Into<String>) -> ConnectOutcome {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Connect { credential: credential.into(), reply }).is_err() {
            return ConnectOutcome::ShutDown;
        }
        rx.await.unwrap_or(ConnectOutcome::ShutDown)
    }

    /// Tears the link down, cancels reconnection and clears pending emits.
    pub async fn disconnect(&self) {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Disconnect { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    pub async fn emit(&self, event: impl Into<String>, payload: Value) -> EmitOutcome {
        let (reply, rx) = oneshot::channel();
        let command = Command::Emit { event: event.into(), payload, reply };
        if self.commands.send(command).is_err() {
            return EmitOutcome::ShutDown;
        }
        rx.await.unwrap_or(EmitOutcome::ShutDown)
    }

    pub async fn emit_event(&self, event: &OutboundEvent) -> EmitOutcome {
        self.emit(event.name(), event.payload()).await
    }

    /// Hands `event` to the manager without waiting for the outcome. Registry
    /// listeners run on the manager task and must use this instead of
    /// [`Self::emit_event`]. Returns `false` once the manager is gone.
    pub fn emit_detached(&self, event: &OutboundEvent) -> bool {
        let (reply, _) = oneshot::channel();
        let command = Command::Emit { event: event.name().to_string(), payload: event.payload(), reply };
        self.commands.send(command).is_ok()
    }

    /// Disconnects and stops the manager task even while other handles are
    /// still alive. Later calls on any handle report `ShutDown`.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Waits until the published status satisfies `predicate`. Returns `None`
    /// if the manager task ended first.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Option<ConnectionStatus>
    where
        F: FnMut(&ConnectionStatus) -> bool,
    {
        let mut rx = self.status.clone();
        rx.wait_for(|status| predicate(status)).await.ok().map(|status| status.clone())
    }
}

/// The actor. Constructed and started by [`ConnectionManager::spawn`].
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    registry: EventRegistry,
    status_tx: watch::Sender<ConnectionStatus>,
    backoff: Backoff,
    connect_timeout: Duration,
    connect_throttle: Duration,
    max_attempts: u32,

    state: ConnectionState,
    attempt_count: u32,
    last_attempt: Option<Instant>,
    credential: Option<Credential>,
    failure: Option<ConnectionFailure>,
    link: Option<Link>,
    attempt: Option<Attempt>,
    retry_at: Option<Pin<Box<Sleep>>>,
    pending: PendingEmitQueue,
}

impl ConnectionManager {
    /// Starts the manager task. The task ends on [`ConnectionHandle::shutdown`]
    /// or once every handle is dropped.
    pub fn spawn(
        config: &RealtimeConfig,
        connector: Arc<dyn Connector>,
        registry: EventRegistry,
    ) -> (ConnectionHandle, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());

        let manager = ConnectionManager {
            connector,
            registry,
            status_tx,
            backoff: Backoff::new(
                config.reconnect_base_delay(),
                config.reconnect_max_delay(),
                config.reconnect_jitter,
            ),
            connect_timeout: config.connect_timeout(),
            connect_throttle: config.connect_throttle(),
            max_attempts: config.max_reconnect_attempts,
            state: ConnectionState::Disconnected,
            attempt_count: 0,
            last_attempt: None,
            credential: None,
            failure: None,
            link: None,
            attempt: None,
            retry_at: None,
            pending: PendingEmitQueue::new(config.lossless_event_set(), config.max_pending_per_event),
        };

        let task = tokio::spawn(manager.run(commands_rx));
        (ConnectionHandle { commands: commands_tx, status: status_rx }, task)
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        log::debug!("Connection manager started.");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.disconnect();
                        self.publish();
                        let _ = reply.send(());
                        log::debug!("Connection manager stopped on request.");
                        return;
                    }
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                result = next_attempt(&mut self.attempt) => {
                    self.attempt = None;
                    self.on_attempt_finished(result);
                }
                () = next_retry(&mut self.retry_at) => {
                    self.retry_at = None;
                    self.start_attempt();
                }
                event = next_link_event(&mut self.link) => self.on_link_event(event),
            }
            self.publish();
        }

        self.disconnect();
        self.publish();
        log::debug!("Connection manager stopped: all handles dropped.");
    }

    /// Status is published before the reply, so a caller that reads
    /// `status()` right after a command returns sees its effect.
    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { credential, reply } => {
                let outcome = self.connect(credential);
                self.publish();
                let _ = reply.send(outcome);
            }
            Command::Disconnect { reply } => {
                self.disconnect();
                self.publish();
                let _ = reply.send(());
            }
            Command::Emit { event, payload, reply } => {
                let outcome = self.emit(&event, payload);
                self.publish();
                let _ = reply.send(outcome);
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn connect(&mut self, raw: String) -> ConnectOutcome {
        let Some(credential) = Credential::new(raw) else {
            log::warn!("connect() called without a credential; no connection attempt made");
            return ConnectOutcome::MissingCredential;
        };

        match self.state {
            ConnectionState::Connected => return ConnectOutcome::AlreadyConnected,
            ConnectionState::Connecting | ConnectionState::Reconnecting => return ConnectOutcome::InProgress,
            ConnectionState::Disconnected => {}
        }

        if let Some(last) = self.last_attempt {
            let since = last.elapsed();
            if since < self.connect_throttle {
                log::debug!("Connection attempt dropped: {} ms since the previous one", since.as_millis());
                return ConnectOutcome::Throttled;
            }
        }

        self.credential = Some(credential);
        self.attempt_count = 0;
        self.failure = None;
        self.state = ConnectionState::Connecting;
        self.start_attempt();
        ConnectOutcome::Started
    }

    fn start_attempt(&mut self) {
        let Some(credential) = self.credential.as_ref() else {
            self.state = ConnectionState::Disconnected;
            return;
        };

        if self.state == ConnectionState::Reconnecting {
            self.attempt_count += 1;
            log::info!("Reconnection attempt {}/{}", self.attempt_count, self.max_attempts);
        } else {
            log::info!("Connecting to the real-time server");
        }

        self.last_attempt = Some(Instant::now());
        let connecting = self.connector.connect(credential);
        self.attempt = Some(Box::pin(timeout(self.connect_timeout, connecting)));
    }

    fn on_attempt_finished(&mut self, result: Result<Result<Link, TransportError>, Elapsed>) {
        match result {
            Ok(Ok(link)) => self.on_open(link),
            Ok(Err(TransportError::Unauthorized(reason))) => self.on_server_rejection(reason),
            Ok(Err(e)) => {
                log::warn!("Connection attempt failed: {}", e);
                self.on_network_failure();
            }
            Err(_) => {
                log::warn!("Connection attempt timed out after {:?}", self.connect_timeout);
                self.on_network_failure();
            }
        }
    }

    fn on_open(&mut self, link: Link) {
        self.link = Some(link);
        self.state = ConnectionState::Connected;
        self.attempt_count = 0;
        self.failure = None;
        log::info!("Real-time channel connected.");

        // Flush runs before the next command is read, so queued emits always
        // precede anything emitted after the reconnect.
        self.flush_pending();
        self.registry.dispatch(&RealtimeEvent::Connected);
    }

    fn flush_pending(&mut self) {
        let Some(link) = self.link.as_ref() else {
            return;
        };
        let queued = self.pending.drain();
        if queued.is_empty() {
            return;
        }

        log::info!("Flushing {} pending emit(s)", queued.len());
        for entry in queued {
            if link.outbound.send(Frame::new(entry.event.clone(), entry.payload)).is_err() {
                log::warn!("Pending emit '{}' lost: link closed during flush", entry.event);
            }
        }
    }

    fn on_network_failure(&mut self) {
        self.link = None;

        if self.attempt_count >= self.max_attempts {
            self.state = ConnectionState::Disconnected;
            let failure = ConnectionFailure::UnableToConnect { attempts: self.attempt_count };
            log::error!("{}", failure);
            self.failure = Some(failure.clone());
            self.registry.dispatch(&RealtimeEvent::ConnectError(failure));
            return;
        }

        self.state = ConnectionState::Reconnecting;
        let next = self.attempt_count + 1;
        let delay = self.backoff.delay(next);
        log::info!("Reconnecting in {:?} (attempt {}/{})", delay, next, self.max_attempts);
        self.retry_at = Some(Box::pin(sleep(delay)));
    }

    fn on_server_rejection(&mut self, reason: String) {
        self.link = None;
        self.attempt = None;
        self.retry_at = None;
        self.state = ConnectionState::Disconnected;
        self.attempt_count = 0;

        let dropped = self.pending.clear();
        let failure = ConnectionFailure::DisconnectedByServer { reason };
        log::error!("{} ({} pending emit(s) discarded)", failure, dropped);
        self.failure = Some(failure.clone());
        self.registry.dispatch(&RealtimeEvent::ConnectError(failure));
    }

    fn on_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Frame(frame) => {
                dispatch_frame(&self.registry, &frame);
            }
            LinkEvent::Closed(reason) => {
                self.link = None;
                log::warn!("Real-time channel closed: {}", reason);
                self.registry.dispatch(&RealtimeEvent::Disconnected(reason.clone()));

                match reason {
                    DisconnectReason::ServerInitiated(detail) => self.on_server_rejection(detail),
                    DisconnectReason::ClientInitiated => {
                        self.state = ConnectionState::Disconnected;
                    }
                    DisconnectReason::TransportClose
                    | DisconnectReason::TransportError(_)
                    | DisconnectReason::ConnectTimeout => self.on_network_failure(),
                }
            }
        }
    }

    fn emit(&mut self, event: &str, mut payload: Value) -> EmitOutcome {
        if self.state == ConnectionState::Connected {
            if let Some(link) = self.link.as_ref() {
                match link.outbound.send(Frame::new(event, payload)) {
                    Ok(()) => return EmitOutcome::Sent,
                    Err(mpsc::error::SendError(frame)) => {
                        log::debug!("Link closed under emit of '{}'; queueing", event);
                        payload = frame.data;
                    }
                }
            }
        }

        self.pending.enqueue(event, payload);
        log::debug!("Queued '{}' until the channel is open ({} pending)", event, self.pending.len());
        EmitOutcome::Queued
    }

    fn disconnect(&mut self) {
        let was_active = self.state != ConnectionState::Disconnected
            || self.link.is_some()
            || self.attempt.is_some()
            || self.retry_at.is_some();

        self.attempt = None;
        self.retry_at = None;
        let had_link = self.link.take().is_some();
        let dropped = self.pending.clear();
        self.attempt_count = 0;
        self.credential = None;
        self.failure = None;
        self.state = ConnectionState::Disconnected;

        if had_link {
            self.registry.dispatch(&RealtimeEvent::Disconnected(DisconnectReason::ClientInitiated));
        }
        if was_active {
            log::info!("Disconnected by client ({} pending emit(s) discarded)", dropped);
        }
    }

    fn publish(&self) {
        let status = ConnectionStatus {
            state: self.state,
            attempt_count: self.attempt_count,
            pending_emits: self.pending.len(),
            failure: self.failure.clone(),
        };
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}

async fn next_attempt(attempt: &mut Option<Attempt>) -> Result<Result<Link, TransportError>, Elapsed> {
    match attempt {
        Some(connecting) => connecting.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn next_retry(retry_at: &mut Option<Pin<Box<Sleep>>>) {
    match retry_at {
        Some(delay) => delay.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn next_link_event(link: &mut Option<Link>) -> LinkEvent {
    match link {
        Some(link) => link
            .inbound
            .recv()
            .await
            .unwrap_or(LinkEvent::Closed(DisconnectReason::TransportClose)),
        None => std::future::pending().await,
    }
}
