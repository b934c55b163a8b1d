//! # Notification Store
//!
//! The canonical client-side notification list. Pure and synchronous: the
//! synchronizer wraps it in a mutex and drives it from socket pushes, REST
//! pulls and user mutations.
//!
//! Records are keyed by id. Two records for the same id are combined by
//! [`merge`], which is order-independent for one push and one pull, so the
//! list converges no matter which of the two arrives first.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::models::{Notification, NotificationId};

/// Deleted ids remembered so that a stale pull cannot bring them back.
pub const TOMBSTONE_LIMIT: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Delivered over the live socket.
    Pushed,
    /// Returned by a REST pull.
    Pulled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredNotification {
    pub notification: Notification,
    pub provenance: Provenance,
    /// Marked read locally, not yet confirmed by the server.
    pub read_pending: bool,
}

impl StoredNotification {
    fn fresh(notification: Notification, provenance: Provenance) -> Self {
        Self { notification, provenance, read_pending: false }
    }
}

/// Combines the held record with an incoming copy of the same notification.
///
/// Content comes from `incoming`, except that the first pull after a push
/// keeps the pushed content. The result takes the incoming provenance, so a
/// later pull updates content again. `read` is the OR of both sides.
pub fn merge(current: &StoredNotification, incoming: &Notification, provenance: Provenance) -> StoredNotification {
    let keep_current = current.provenance == Provenance::Pushed && provenance == Provenance::Pulled;
    let mut notification = if keep_current { current.notification.clone() } else { incoming.clone() };
    notification.read = current.notification.read || incoming.read;

    StoredNotification {
        notification,
        provenance,
        read_pending: current.read_pending && !incoming.read,
    }
}

/// What happened to one incoming record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Inserted,
    Merged,
    Unchanged,
    /// The id was deleted locally.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PullSummary {
    pub inserted: usize,
    pub merged: usize,
    pub ignored: usize,
    pub evicted: usize,
}

/// A local change that can be undone if the server rejects it.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    MarkRead(Vec<NotificationId>),
    MarkAllRead,
    Delete(Vec<NotificationId>),
}

/// Undo information returned by [`NotificationStore::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum Inverse {
    /// Ids this mutation flipped from unread to read.
    MarkUnread(Vec<NotificationId>),
    /// Ids this mutation tombstoned, and the records it removed.
    Restore { ids: Vec<NotificationId>, entries: Vec<StoredNotification> },
    Nothing,
}

#[derive(Debug)]
pub struct NotificationStore {
    entries: HashMap<NotificationId, StoredNotification>,
    tombstones: VecDeque<NotificationId>,
    tombstoned: HashSet<NotificationId>,
    capacity: usize,
    version: u64,
}

impl NotificationStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            tombstones: VecDeque::new(),
            tombstoned: HashSet::new(),
            capacity: capacity.max(1),
            version: 0,
        }
    }

    pub fn apply_push(&mut self, notification: Notification) -> Applied {
        let applied = self.upsert(notification, Provenance::Pushed);
        if applied == Applied::Inserted {
            self.evict_overflow();
        }
        applied
    }

    pub fn apply_pull<I>(&mut self, batch: I) -> PullSummary
    where
        I: IntoIterator<Item = Notification>,
    {
        let mut summary = PullSummary::default();
        for notification in batch {
            match self.upsert(notification, Provenance::Pulled) {
                Applied::Inserted => summary.inserted += 1,
                Applied::Merged => summary.merged += 1,
                Applied::Ignored => summary.ignored += 1,
                Applied::Unchanged => {}
            }
        }
        summary.evicted = self.evict_overflow();
        summary
    }

    fn upsert(&mut self, notification: Notification, provenance: Provenance) -> Applied {
        if self.tombstoned.contains(&notification.id) {
            return Applied::Ignored;
        }

        let applied = match self.entries.get_mut(&notification.id) {
            Some(current) => {
                let merged = merge(current, &notification, provenance);
                if merged == *current {
                    Applied::Unchanged
                } else {
                    *current = merged;
                    Applied::Merged
                }
            }
            None => {
                let id = notification.id.clone();
                self.entries.insert(id, StoredNotification::fresh(notification, provenance));
                Applied::Inserted
            }
        };

        if matches!(applied, Applied::Inserted | Applied::Merged) {
            self.version += 1;
        }
        applied
    }

    /// Drops the oldest records (by `created_at`) beyond capacity.
    fn evict_overflow(&mut self) -> usize {
        let mut evicted = 0;
        while self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .values()
                .min_by(|a, b| {
                    a.notification
                        .created_at
                        .cmp(&b.notification.created_at)
                        .then_with(|| b.notification.id.cmp(&a.notification.id))
                })
                .map(|entry| entry.notification.id.clone());
            let Some(id) = oldest else {
                break;
            };
            self.entries.remove(&id);
            evicted += 1;
        }
        if evicted > 0 {
            self.version += 1;
            log::debug!("Evicted {} notification(s) over capacity {}", evicted, self.capacity);
        }
        evicted
    }

    pub fn apply(&mut self, mutation: &Mutation) -> Inverse {
        let inverse = match mutation {
            Mutation::MarkRead(ids) => Self::mark_unread_inverse(self.mark_read(ids.iter())),
            Mutation::MarkAllRead => {
                let unread: Vec<NotificationId> = self
                    .entries
                    .values()
                    .filter(|e| !e.notification.read)
                    .map(|e| e.notification.id.clone())
                    .collect();
                Self::mark_unread_inverse(self.mark_read(unread.iter()))
            }
            Mutation::Delete(ids) => {
                let mut entries = Vec::new();
                let mut tombstoned = Vec::new();
                for id in ids {
                    if let Some(entry) = self.entries.remove(id) {
                        entries.push(entry);
                    }
                    if self.tombstone(id.clone()) {
                        tombstoned.push(id.clone());
                    }
                }
                if entries.is_empty() && tombstoned.is_empty() {
                    Inverse::Nothing
                } else {
                    Inverse::Restore { ids: tombstoned, entries }
                }
            }
        };
        if inverse != Inverse::Nothing {
            self.version += 1;
        }
        inverse
    }

    fn mark_unread_inverse(flipped: Vec<NotificationId>) -> Inverse {
        if flipped.is_empty() {
            Inverse::Nothing
        } else {
            Inverse::MarkUnread(flipped)
        }
    }

    fn mark_read<'a>(&mut self, ids: impl Iterator<Item = &'a NotificationId>) -> Vec<NotificationId> {
        let mut flipped = Vec::new();
        for id in ids {
            if let Some(entry) = self.entries.get_mut(id) {
                if !entry.notification.read {
                    entry.notification.read = true;
                    entry.read_pending = true;
                    flipped.push(id.clone());
                }
            }
        }
        flipped
    }

    /// Undoes a rejected mutation. A notification the server has meanwhile
    /// reported as read stays read.
    pub fn revert(&mut self, inverse: Inverse) {
        match inverse {
            Inverse::MarkUnread(ids) => {
                for id in &ids {
                    if let Some(entry) = self.entries.get_mut(id) {
                        if entry.read_pending {
                            entry.notification.read = false;
                            entry.read_pending = false;
                        }
                    }
                }
            }
            Inverse::Restore { ids, entries } => {
                let removed: HashSet<NotificationId> = ids.into_iter().collect();
                self.tombstones.retain(|id| !removed.contains(id));
                self.tombstoned.retain(|id| !removed.contains(id));
                for entry in entries {
                    self.entries.entry(entry.notification.id.clone()).or_insert(entry);
                }
                self.evict_overflow();
            }
            Inverse::Nothing => return,
        }
        self.version += 1;
    }

    /// Settles a mutation the server accepted.
    pub fn confirm(&mut self, inverse: &Inverse) {
        if let Inverse::MarkUnread(ids) = inverse {
            for id in ids {
                if let Some(entry) = self.entries.get_mut(id) {
                    entry.read_pending = false;
                }
            }
        }
    }

    fn tombstone(&mut self, id: NotificationId) -> bool {
        if !self.tombstoned.insert(id.clone()) {
            return false;
        }
        self.tombstones.push_back(id);
        while self.tombstones.len() > TOMBSTONE_LIMIT {
            if let Some(expired) = self.tombstones.pop_front() {
                self.tombstoned.remove(&expired);
            }
        }
        true
    }

    pub fn get(&self, id: &NotificationId) -> Option<&StoredNotification> {
        self.entries.get(id)
    }

    pub fn is_tombstoned(&self, id: &NotificationId) -> bool {
        self.tombstoned.contains(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unread_count(&self) -> usize {
        self.entries.values().filter(|e| !e.notification.read).count()
    }

    /// Bumped on every visible change.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Newest first.
    pub fn list(&self) -> Vec<Notification> {
        let mut items: Vec<Notification> = self.entries.values().map(|e| e.notification.clone()).collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        items
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.tombstones.clear();
        self.tombstoned.clear();
        self.version += 1;
    }
}
