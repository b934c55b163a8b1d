//! # Realtime Client
//!
//! The service object that wires the layer together. Construct it once after
//! configuration is loaded, call [`RealtimeClient::login`] once a credential is
//! known, and [`RealtimeClient::teardown`] on shutdown. Nothing here is a
//! global: tests build as many independent clients as they need.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::configs::realtime_config::{ConfigError, RealtimeConfig};
use crate::core::connection_manager::{ConnectOutcome, ConnectionHandle, ConnectionManager};
use crate::core::registry::{EventRegistry, Subscription};
use crate::core::transport::Connector;
use crate::ingestors::notification_polling::NotificationPoller;
use crate::retrieve::backend::{MessagingBackend, NotificationBackend};
use crate::sync::synchronizer::NotificationSynchronizer;
use crate::views::{ActivityFeed, ConversationView, NotificationBell, NotificationCenter};

pub struct RealtimeClient<B> {
    config: RealtimeConfig,
    registry: EventRegistry,
    connection: ConnectionHandle,
    manager_task: Option<JoinHandle<()>>,
    sync: NotificationSynchronizer<B>,
    sync_subscription: Option<Subscription>,
    activity: ActivityFeed,
    shutdown: CancellationToken,
    poller: Option<(CancellationToken, JoinHandle<()>)>,
}

impl<B: NotificationBackend> RealtimeClient<B> {
    /// Validates `config`, spawns the connection manager and attaches the
    /// notification store and activity feed. Must be called inside a tokio
    /// runtime.
    pub fn init(config: RealtimeConfig, connector: Arc<dyn Connector>, backend: Arc<B>) -> Result<Self, ConfigError> {
        config.validate()?;

        let registry = EventRegistry::new();
        let (connection, manager_task) = ConnectionManager::spawn(&config, connector, registry.clone());
        let sync = NotificationSynchronizer::new(backend, &config);
        let sync_subscription = sync.attach(&registry);
        let activity = ActivityFeed::attach(&registry, config.activity_capacity);

        log::info!("Real-time client initialized for {}", config.socket_url);

        Ok(Self {
            config,
            registry,
            connection,
            manager_task: Some(manager_task),
            sync,
            sync_subscription: Some(sync_subscription),
            activity,
            shutdown: CancellationToken::new(),
            poller: None,
        })
    }

    /// Connects with `credential` and starts the notification poller.
    pub async fn login(&mut self, credential: impl Into<String>) -> ConnectOutcome {
        let outcome = self.connection.connect(credential).await;
        match outcome {
            ConnectOutcome::MissingCredential | ConnectOutcome::ShutDown => {}
            _ => self.start_poller(),
        }
        outcome
    }

    /// Disconnects, stops polling and forgets all notifications. The client
    /// can log in again afterwards.
    pub async fn logout(&mut self) {
        self.stop_poller().await;
        self.connection.disconnect().await;
        self.sync.clear();
        self.activity.clear();
    }

    fn start_poller(&mut self) {
        if self.poller.is_some() {
            return;
        }
        let cancel = self.shutdown.child_token();
        let poller = NotificationPoller::new(self.sync.clone(), &self.config, cancel.clone());
        let task = tokio::spawn(async move { poller.run().await });
        self.poller = Some((cancel, task));
    }

    async fn stop_poller(&mut self) {
        if let Some((cancel, task)) = self.poller.take() {
            cancel.cancel();
            if let Err(e) = task.await {
                log::warn!("Notification poller ended abnormally: {}", e);
            }
        }
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    pub fn notifications(&self) -> &NotificationSynchronizer<B> {
        &self.sync
    }

    pub fn activity(&self) -> &ActivityFeed {
        &self.activity
    }

    pub fn center(&self) -> NotificationCenter<B> {
        NotificationCenter::new(self.sync.clone())
    }

    pub fn bell(&self) -> NotificationBell<B> {
        NotificationBell::new(self.sync.clone(), self.config.bell_recent_limit)
    }

    pub fn conversation<M: MessagingBackend>(&self, backend: Arc<M>, self_id: impl Into<String>) -> ConversationView<M> {
        ConversationView::attach(&self.registry, self.connection.clone(), backend, self_id)
    }

    /// Stops the poller and the connection manager, drops every listener and
    /// waits for the background tasks to finish.
    pub async fn teardown(mut self) {
        self.shutdown.cancel();
        self.stop_poller().await;
        self.connection.shutdown().await;
        if let Some(task) = self.manager_task.take() {
            if let Err(e) = task.await {
                log::warn!("Connection manager ended abnormally: {}", e);
            }
        }

        if let Some(subscription) = self.sync_subscription.take() {
            subscription.unsubscribe();
        }
        self.activity.detach();
        self.registry.clear();
        self.sync.clear();
        log::info!("Real-time client torn down.");
    }
}

impl<B> Drop for RealtimeClient<B> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
