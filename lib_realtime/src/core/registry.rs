//! # Event Registry
//!
//! Maps an [`EventKind`] to the listeners registered for it. `on` hands back a
//! [`Subscription`] token, so callers never need to keep the closure around to
//! unregister it later.
//!
//! Dispatch takes a snapshot of the listeners under the lock and invokes them
//! after releasing it: listeners may call `on`/`off` from inside a callback.
//! A listener that returns an error or panics is logged and skipped; the
//! remaining listeners for the same event still run.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::core::events::{EventKind, RealtimeEvent};

type Callback = Arc<dyn Fn(&RealtimeEvent) -> anyhow::Result<()> + Send + Sync>;

struct Listener {
    id: u64,
    callback: Callback,
}

#[derive(Default)]
struct Inner {
    listeners: Mutex<HashMap<EventKind, Vec<Listener>>>,
    next_id: AtomicU64,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, HashMap<EventKind, Vec<Listener>>> {
        // Callbacks never run under this lock, so a poisoned map is still consistent.
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, kind: &EventKind, id: u64) -> bool {
        let mut listeners = self.lock();
        let Some(entries) = listeners.get_mut(kind) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|l| l.id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            listeners.remove(kind);
        }
        removed
    }
}

/// Outcome of a single [`EventRegistry::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
    /// Listeners that returned `Ok`.
    pub delivered: usize,
    /// Listeners that returned `Err` or panicked.
    pub failed: usize,
}

/// Cloneable handle to a shared listener table.
#[derive(Clone, Default)]
pub struct EventRegistry {
    inner: Arc<Inner>,
}

/// Disposable token returned by [`EventRegistry::on`]. Holding it does not
/// keep the registry alive; using it after the registry is gone is a no-op.
#[must_use = "dropping the token keeps the listener registered with no way to remove it individually"]
#[derive(Debug)]
pub struct Subscription {
    kind: EventKind,
    id: u64,
    registry: Weak<Inner>,
}

impl Subscription {
    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// Removes exactly this listener. Returns `false` when it was already
    /// removed or the registry no longer exists.
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(inner) => inner.remove(&self.kind, self.id),
            None => false,
        }
    }
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for `kind`. Registering the same closure twice
    /// makes it run twice per event.
    pub fn on<F>(&self, kind: EventKind, callback: F) -> Subscription
    where
        F: Fn(&RealtimeEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .lock()
            .entry(kind.clone())
            .or_default()
            .push(Listener { id, callback: Arc::new(callback) });
        log::debug!("Listener {} registered for '{}'", id, kind);
        Subscription { kind, id, registry: Arc::downgrade(&self.inner) }
    }

    /// With a token, removes only that listener; without one, removes every
    /// listener for `kind`. Returns how many listeners were removed.
    pub fn off(&self, kind: &EventKind, subscription: Option<&Subscription>) -> usize {
        match subscription {
            Some(sub) => {
                if &sub.kind != kind || !Weak::ptr_eq(&sub.registry, &Arc::downgrade(&self.inner)) {
                    return 0;
                }
                usize::from(self.inner.remove(kind, sub.id))
            }
            None => self.inner.lock().remove(kind).map_or(0, |entries| entries.len()),
        }
    }

    /// Invokes every listener registered for the event's kind at this moment,
    /// in registration order.
    pub fn dispatch(&self, event: &RealtimeEvent) -> DispatchReport {
        let kind = event.kind();
        let snapshot: Vec<(u64, Callback)> = match self.inner.lock().get(&kind) {
            Some(entries) => entries.iter().map(|l| (l.id, Arc::clone(&l.callback))).collect(),
            None => return DispatchReport::default(),
        };

        let mut report = DispatchReport::default();
        for (id, callback) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    log::warn!("Listener {} for '{}' failed: {:#}", id, kind, e);
                }
                Err(_) => {
                    report.failed += 1;
                    log::error!("Listener {} for '{}' panicked; continuing with the rest", id, kind);
                }
            }
        }
        report
    }

    pub fn listener_count(&self, kind: &EventKind) -> usize {
        self.inner.lock().get(kind).map_or(0, Vec::len)
    }

    /// Drops every listener. Outstanding tokens become inert.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}
