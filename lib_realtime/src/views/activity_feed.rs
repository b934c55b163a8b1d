//! # Activity Feed
//!
//! Bounded, newest-first list of `company_activity` and `internship:created`
//! pushes. Live only: nothing is fetched, and items received before the feed
//! was attached are not replayed.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::core::events::{EventKind, RealtimeEvent};
use crate::core::registry::{EventRegistry, Subscription};
use crate::models::ActivityItem;

pub struct ActivityFeed {
    items: Arc<Mutex<VecDeque<ActivityItem>>>,
    subscriptions: Vec<Subscription>,
}

impl ActivityFeed {
    pub fn attach(registry: &EventRegistry, capacity: usize) -> Self {
        let items = Arc::new(Mutex::new(VecDeque::with_capacity(capacity)));
        let capacity = capacity.max(1);

        let subscriptions = [EventKind::CompanyActivity, EventKind::InternshipCreated]
            .into_iter()
            .map(|kind| {
                let items = Arc::clone(&items);
                registry.on(kind, move |event| {
                    let item = match event {
                        RealtimeEvent::CompanyActivity(item) | RealtimeEvent::InternshipCreated(item) => item,
                        _ => return Ok(()),
                    };
                    let mut items = items.lock().unwrap_or_else(PoisonError::into_inner);
                    items.push_front(item.clone());
                    items.truncate(capacity);
                    Ok(())
                })
            })
            .collect();

        Self { items, subscriptions }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<ActivityItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Newest first.
    pub fn items(&self) -> Vec<ActivityItem> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Stops listening. Items already received stay readable. Called on drop
    /// as well.
    pub fn detach(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
    }
}

impl Drop for ActivityFeed {
    fn drop(&mut self) {
        self.detach();
    }
}
