//! # Notification Center
//!
//! Paged, filterable list over the synchronizer. The center owns no
//! notifications of its own: it pulls pages into the shared store and shows
//! the store through its filter, so a push or a mutation made elsewhere (the
//! bell, another view) is visible here immediately.

use crate::models::{Notification, NotificationId, NotificationType, Priority};
use crate::retrieve::backend::{NotificationBackend, NotificationQuery};
use crate::sync::synchronizer::{NotificationSynchronizer, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadFilter {
    #[default]
    All,
    Unread,
    Read,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NotificationFilter {
    pub kind: Option<NotificationType>,
    pub priority: Option<Priority>,
    pub read: ReadFilter,
}

impl NotificationFilter {
    pub fn matches(&self, notification: &Notification) -> bool {
        self.kind.map_or(true, |kind| notification.kind == kind)
            && self.priority.map_or(true, |priority| notification.priority == priority)
            && match self.read {
                ReadFilter::All => true,
                ReadFilter::Unread => !notification.read,
                ReadFilter::Read => notification.read,
            }
    }

    /// The server filters by type, priority and unread-only; a read-only view
    /// is filtered locally.
    pub fn to_query(&self, page: u32, limit: u32) -> NotificationQuery {
        NotificationQuery {
            page: page.max(1),
            limit,
            kind: self.kind,
            priority: self.priority,
            unread_only: self.read == ReadFilter::Unread,
        }
    }
}

pub struct NotificationCenter<B> {
    sync: NotificationSynchronizer<B>,
    filter: NotificationFilter,
    loaded_page: u32,
    total_pages: u32,
}

impl<B: NotificationBackend> NotificationCenter<B> {
    pub fn new(sync: NotificationSynchronizer<B>) -> Self {
        Self { sync, filter: NotificationFilter::default(), loaded_page: 0, total_pages: 0 }
    }

    pub fn filter(&self) -> NotificationFilter {
        self.filter
    }

    /// Changes the filter. Paging starts over; call [`Self::refresh`] to load.
    pub fn set_filter(&mut self, filter: NotificationFilter) {
        if self.filter != filter {
            self.filter = filter;
            self.loaded_page = 0;
            self.total_pages = 0;
        }
    }

    /// Notifications matching the filter, newest first.
    pub fn visible(&self) -> Vec<Notification> {
        self.sync.notifications().into_iter().filter(|n| self.filter.matches(n)).collect()
    }

    pub fn unread_count(&self) -> usize {
        self.sync.unread_count()
    }

    /// Pulls page 1 for the active filter.
    pub async fn refresh(&mut self) -> Result<(), SyncError> {
        self.load_page(1).await
    }

    /// Pulls the next page. Returns `false` when there was nothing more.
    pub async fn load_more(&mut self) -> Result<bool, SyncError> {
        if !self.has_more() {
            return Ok(false);
        }
        self.load_page(self.loaded_page + 1).await?;
        Ok(true)
    }

    /// Before the first load there is always more.
    pub fn has_more(&self) -> bool {
        self.loaded_page == 0 || self.loaded_page < self.total_pages
    }

    async fn load_page(&mut self, page: u32) -> Result<(), SyncError> {
        let query = self.filter.to_query(page, self.sync.page_size());
        let result = self.sync.pull(&query).await?;
        self.loaded_page = result.page.max(page);
        self.total_pages = result.total_pages;
        Ok(())
    }

    pub async fn mark_read(&self, id: &NotificationId) -> Result<(), SyncError> {
        self.sync.mark_read(id).await
    }

    pub async fn mark_all_read(&self) -> Result<(), SyncError> {
        self.sync.mark_all_read().await
    }

    pub async fn delete(&self, id: &NotificationId) -> Result<(), SyncError> {
        self.sync.delete(id).await
    }

    /// Deletes everything currently visible in one bulk call. Returns how many
    /// notifications were removed.
    pub async fn delete_filtered(&self) -> Result<usize, SyncError> {
        let ids: Vec<NotificationId> = self.visible().into_iter().map(|n| n.id).collect();
        self.sync.delete_many(&ids).await?;
        Ok(ids.len())
    }
}
