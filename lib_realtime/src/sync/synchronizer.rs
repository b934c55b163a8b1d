//! # Notification Synchronizer
//!
//! Async front of the [`NotificationStore`]. Socket pushes arrive through a
//! registry listener, pulls and mutations go through the REST backend.
//! Mutations are applied optimistically and rolled back if the server rejects
//! them. Every change publishes a fresh [`SyncSnapshot`].

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::watch;

use crate::configs::realtime_config::RealtimeConfig;
use crate::core::events::{EventKind, RealtimeEvent};
use crate::core::registry::{EventRegistry, Subscription};
use crate::models::{Notification, NotificationId, NotificationPage};
use crate::retrieve::backend::{ApiError, NotificationBackend, NotificationQuery};
use crate::sync::store::{Applied, Mutation, NotificationStore};

/// Counters observers can watch without locking the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncSnapshot {
    pub unread: usize,
    pub total: usize,
    pub version: u64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The server rejected a mutation; the local change was rolled back.
    #[error("Could not {operation}: {source}")]
    Persistence { operation: &'static str, source: ApiError },

    #[error("Could not load notifications: {0}")]
    Pull(#[source] ApiError),
}

pub struct NotificationSynchronizer<B> {
    backend: Arc<B>,
    store: Arc<Mutex<NotificationStore>>,
    snapshot: Arc<watch::Sender<SyncSnapshot>>,
    page_size: u32,
}

impl<B> Clone for NotificationSynchronizer<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            store: Arc::clone(&self.store),
            snapshot: Arc::clone(&self.snapshot),
            page_size: self.page_size,
        }
    }
}

impl<B: NotificationBackend> NotificationSynchronizer<B> {
    pub fn new(backend: Arc<B>, config: &RealtimeConfig) -> Self {
        let (snapshot, _) = watch::channel(SyncSnapshot::default());
        Self {
            backend,
            store: Arc::new(Mutex::new(NotificationStore::new(config.store_capacity))),
            snapshot: Arc::new(snapshot),
            page_size: config.page_size,
        }
    }

    /// Feeds `notification` pushes from `registry` into the store.
    pub fn attach(&self, registry: &EventRegistry) -> Subscription {
        let sync = self.clone();
        registry.on(EventKind::Notification, move |event| {
            if let RealtimeEvent::Notification(notification) = event {
                let id = notification.id.clone();
                match sync.with_store(|store| store.apply_push(notification.clone())) {
                    Applied::Ignored => log::debug!("Push for deleted notification {} ignored", id),
                    applied => log::debug!("Push for notification {}: {:?}", id, applied),
                }
            }
            Ok(())
        })
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Fetches one page and merges it into the store.
    pub async fn pull(&self, query: &NotificationQuery) -> Result<NotificationPage, SyncError> {
        let page = self.backend.fetch_notifications(query).await.map_err(|e| {
            log::warn!("Notification pull (page {}) failed: {}", query.page, e);
            SyncError::Pull(e)
        })?;

        let summary = self.with_store(|store| store.apply_pull(page.notifications.iter().cloned()));
        log::debug!(
            "Pulled page {}/{}: {} new, {} merged, {} ignored, {} evicted",
            page.page,
            page.total_pages,
            summary.inserted,
            summary.merged,
            summary.ignored,
            summary.evicted
        );
        Ok(page)
    }

    pub async fn pull_latest(&self) -> Result<NotificationPage, SyncError> {
        self.pull(&NotificationQuery::first_page(self.page_size)).await
    }

    /// The server's own unread total, which may exceed what is loaded.
    pub async fn server_unread_count(&self) -> Result<u64, SyncError> {
        self.backend.fetch_unread_count().await.map_err(SyncError::Pull)
    }

    pub async fn mark_read(&self, id: &NotificationId) -> Result<(), SyncError> {
        self.persist(Mutation::MarkRead(vec![id.clone()]), "mark the notification as read", self.backend.mark_read(id))
            .await
    }

    pub async fn mark_all_read(&self) -> Result<(), SyncError> {
        self.persist(Mutation::MarkAllRead, "mark all notifications as read", self.backend.mark_all_read())
            .await
    }

    pub async fn delete(&self, id: &NotificationId) -> Result<(), SyncError> {
        self.persist(Mutation::Delete(vec![id.clone()]), "delete the notification", self.backend.delete(id))
            .await
    }

    /// One bulk REST call for all of `ids`.
    pub async fn delete_many(&self, ids: &[NotificationId]) -> Result<(), SyncError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.persist(Mutation::Delete(ids.to_vec()), "delete the notifications", self.backend.delete_many(ids))
            .await
    }

    async fn persist<F>(&self, mutation: Mutation, operation: &'static str, call: F) -> Result<(), SyncError>
    where
        F: Future<Output = Result<(), ApiError>>,
    {
        let inverse = self.with_store(|store| store.apply(&mutation));
        match call.await {
            Ok(()) => {
                self.with_store(|store| store.confirm(&inverse));
                Ok(())
            }
            Err(source) => {
                log::warn!("Could not {}: {}. Rolling back.", operation, source);
                self.with_store(|store| store.revert(inverse));
                Err(SyncError::Persistence { operation, source })
            }
        }
    }

    /// Newest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().list()
    }

    pub fn get(&self, id: &NotificationId) -> Option<Notification> {
        self.lock().get(id).map(|entry| entry.notification.clone())
    }

    pub fn unread_count(&self) -> usize {
        self.lock().unread_count()
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        *self.snapshot.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<SyncSnapshot> {
        self.snapshot.subscribe()
    }

    /// Forgets everything, e.g. on sign-out.
    pub fn clear(&self) {
        self.with_store(NotificationStore::clear);
    }

    fn lock(&self) -> MutexGuard<'_, NotificationStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_store<R>(&self, f: impl FnOnce(&mut NotificationStore) -> R) -> R {
        let mut store = self.lock();
        let result = f(&mut store);
        let next = SyncSnapshot { unread: store.unread_count(), total: store.len(), version: store.version() };

        // Published under the store lock so snapshots go out in version order.
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        drop(store);
        result
    }
}
