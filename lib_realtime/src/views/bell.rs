//! # Notification Bell
//!
//! Header badge plus a short dropdown of the newest notifications.

use crate::models::{Notification, NotificationId};
use crate::retrieve::backend::NotificationBackend;
use crate::sync::synchronizer::{NotificationSynchronizer, SyncError};

/// Counts above this render as `"99+"`.
pub const BADGE_LIMIT: usize = 99;

#[derive(Debug, Clone, PartialEq)]
pub struct BellSummary {
    pub unread: usize,
    /// `None` hides the badge.
    pub badge: Option<String>,
    /// Newest first.
    pub recent: Vec<Notification>,
}

pub fn badge_label(unread: usize) -> Option<String> {
    match unread {
        0 => None,
        n if n > BADGE_LIMIT => Some(format!("{BADGE_LIMIT}+")),
        n => Some(n.to_string()),
    }
}

pub struct NotificationBell<B> {
    sync: NotificationSynchronizer<B>,
    recent_limit: usize,
}

impl<B: NotificationBackend> NotificationBell<B> {
    pub fn new(sync: NotificationSynchronizer<B>, recent_limit: usize) -> Self {
        Self { sync, recent_limit }
    }

    pub fn summary(&self) -> BellSummary {
        let mut recent = self.sync.notifications();
        recent.truncate(self.recent_limit);
        let unread = self.sync.unread_count();
        BellSummary { unread, badge: badge_label(unread), recent }
    }

    /// Click-through: marks the notification read and returns where it links
    /// to, if anywhere.
    pub async fn open(&self, id: &NotificationId) -> Result<Option<String>, SyncError> {
        let Some(notification) = self.sync.get(id) else {
            return Ok(None);
        };
        if !notification.read {
            self.sync.mark_read(id).await?;
        }
        Ok(notification.action_url().map(str::to_string))
    }

    pub async fn mark_all_read(&self) -> Result<(), SyncError> {
        self.sync.mark_all_read().await
    }
}
