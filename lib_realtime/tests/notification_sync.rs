mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{config, id, note, MemoryBackend, ScriptedConnector, Step};
use lib_realtime::models::NotificationPage;
use lib_realtime::views::{NotificationFilter, ReadFilter};
use lib_realtime::{
    ApiError, ConnectOutcome, ConnectionState, EventKind, EventRegistry, NotificationBackend, NotificationId,
    NotificationQuery, NotificationSynchronizer, Priority, RealtimeClient, RealtimeEvent, SyncError,
};
use serde_json::json;
use tokio::sync::Notify;

/// Holds every `mark_read` until released, so the optimistic state can be
/// observed while the REST call is in flight.
struct GatedBackend {
    inner: Arc<MemoryBackend>,
    release: Notify,
}

impl NotificationBackend for GatedBackend {
    async fn fetch_notifications(&self, query: &NotificationQuery) -> Result<NotificationPage, ApiError> {
        self.inner.fetch_notifications(query).await
    }

    async fn fetch_unread_count(&self) -> Result<u64, ApiError> {
        self.inner.fetch_unread_count().await
    }

    async fn mark_read(&self, id: &NotificationId) -> Result<(), ApiError> {
        self.release.notified().await;
        self.inner.mark_read(id).await
    }

    async fn mark_all_read(&self) -> Result<(), ApiError> {
        self.inner.mark_all_read().await
    }

    async fn delete(&self, id: &NotificationId) -> Result<(), ApiError> {
        self.inner.delete(id).await
    }

    async fn delete_many(&self, ids: &[NotificationId]) -> Result<(), ApiError> {
        self.inner.delete_many(ids).await
    }
}

fn synchronizer(backend: Arc<MemoryBackend>) -> (NotificationSynchronizer<MemoryBackend>, EventRegistry) {
    let registry = EventRegistry::new();
    let sync = NotificationSynchronizer::new(backend, &config());
    // Dropping the token leaves the listener registered.
    let _ = sync.attach(&registry);
    (sync, registry)
}

fn push(registry: &EventRegistry, notification: lib_realtime::Notification) {
    registry.dispatch(&RealtimeEvent::Notification(notification));
}

#[tokio::test(start_paused = true)]
async fn push_then_optimistic_mark_read_end_to_end() {
    let inner = MemoryBackend::with(Vec::new());
    let backend = Arc::new(GatedBackend { inner: Arc::clone(&inner), release: Notify::new() });
    let (connector, mut servers) = ScriptedConnector::new(&[], Step::Accept);

    let mut client = RealtimeClient::init(config(), connector, Arc::clone(&backend)).unwrap();
    let mut snapshots = client.notifications().watch();

    assert_eq!(client.login("valid-token").await, ConnectOutcome::Started);
    client.connection().wait_for(|s| s.state == ConnectionState::Connected).await.unwrap();
    let server = servers.recv().await.unwrap();

    server.push(
        "notification",
        json!({
            "id": "n1",
            "type": "application_status",
            "title": "Shortlisted",
            "message": "Acme shortlisted you",
            "priority": "high",
            "read": false,
            "createdAt": "2026-10-18T10:00:00Z"
        }),
    );
    snapshots.wait_for(|s| s.unread == 1).await.unwrap();
    assert_eq!(client.bell().summary().badge.as_deref(), Some("1"));

    let sync = client.notifications().clone();
    let pending = tokio::spawn(async move { sync.mark_read(&NotificationId::new("n1")).await });
    snapshots.wait_for(|s| s.unread == 0).await.unwrap();

    // The REST call has not returned yet.
    assert!(client.notifications().get(&id("n1")).unwrap().read);
    assert!(inner.calls().is_empty());

    backend.release.notify_one();
    assert_eq!(pending.await.unwrap(), Ok(()));
    assert_eq!(inner.calls(), vec!["mark_read n1".to_string()]);
    assert_eq!(client.notifications().unread_count(), 0);

    client.teardown().await;
}

#[tokio::test]
async fn failed_mark_read_rolls_back_and_surfaces_the_error() {
    let backend = MemoryBackend::with(vec![note("n1", 0, false)]);
    let (sync, _registry) = synchronizer(Arc::clone(&backend));
    sync.pull_latest().await.unwrap();
    backend.fail_mutations.store(true, Ordering::SeqCst);

    let error = sync.mark_read(&id("n1")).await.unwrap_err();

    assert!(matches!(error, SyncError::Persistence { .. }));
    assert_eq!(error.to_string(), "Could not mark the notification as read: Service temporarily unavailable");
    assert!(!sync.get(&id("n1")).unwrap().read);
    assert_eq!(sync.unread_count(), 1);
}

#[tokio::test]
async fn failed_delete_restores_the_notification() {
    let backend = MemoryBackend::with(vec![note("n1", 0, false), note("n2", 1, false)]);
    let (sync, _registry) = synchronizer(Arc::clone(&backend));
    sync.pull_latest().await.unwrap();
    backend.fail_mutations.store(true, Ordering::SeqCst);

    assert!(sync.delete_many(&[id("n1"), id("n2")]).await.is_err());
    assert_eq!(sync.notifications().len(), 2);
    assert_eq!(backend.calls(), vec!["delete_many 2".to_string()]);
}

#[tokio::test]
async fn push_with_known_id_updates_in_place_and_keeps_local_read() {
    let backend = MemoryBackend::with(vec![note("n1", 0, false)]);
    let (sync, registry) = synchronizer(Arc::clone(&backend));
    sync.pull_latest().await.unwrap();
    sync.mark_read(&id("n1")).await.unwrap();

    let mut updated = note("n1", 0, false);
    updated.title = "Edited".into();
    push(&registry, updated);

    let notifications = sync.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].title, "Edited");
    assert!(notifications[0].read);

    // An older pulled copy neither duplicates nor un-reads it.
    *backend.notifications.lock().unwrap() = vec![note("n1", 0, false)];
    sync.pull_latest().await.unwrap();
    let notifications = sync.notifications();
    assert_eq!(notifications.len(), 1);
    assert!(notifications[0].read);
    assert_eq!(notifications[0].title, "Edited");
}

#[tokio::test]
async fn unread_count_tracks_every_operation_exactly() {
    let backend = MemoryBackend::with((0..6).map(|n| note(&format!("p{n}"), n, n % 2 == 0)).collect());
    let (sync, registry) = synchronizer(Arc::clone(&backend));

    let exact = |sync: &NotificationSynchronizer<MemoryBackend>| {
        sync.notifications().iter().filter(|n| !n.read).count()
    };

    sync.pull_latest().await.unwrap();
    assert_eq!(sync.unread_count(), exact(&sync));
    assert_eq!(sync.unread_count(), 3);

    push(&registry, note("x1", 30, false));
    push(&registry, note("x1", 30, false));
    assert_eq!(sync.unread_count(), 4);

    sync.mark_read(&id("p1")).await.unwrap();
    sync.mark_read(&id("p1")).await.unwrap();
    sync.delete(&id("p3")).await.unwrap();
    sync.delete(&id("p3")).await.unwrap();
    assert_eq!(sync.unread_count(), exact(&sync));
    assert_eq!(sync.unread_count(), 2);

    backend.fail_mutations.store(true, Ordering::SeqCst);
    let _ = sync.mark_all_read().await;
    assert_eq!(sync.unread_count(), 2);

    backend.fail_mutations.store(false, Ordering::SeqCst);
    sync.mark_all_read().await.unwrap();
    assert_eq!(sync.unread_count(), 0);
    assert_eq!(sync.snapshot().unread, 0);

    // A deleted id does not come back with a stale pull.
    backend.notifications.lock().unwrap().push(note("p3", 3, false));
    sync.pull_latest().await.unwrap();
    assert!(sync.get(&id("p3")).is_none());
    assert_eq!(sync.unread_count(), 0);
}

#[tokio::test]
async fn push_and_pull_converge_in_either_order() {
    let pushed = {
        let mut n = note("n1", 0, false);
        n.priority = Priority::High;
        n.title = "live".into();
        n
    };
    let pulled = note("n1", 0, true);

    let (a, registry_a) = synchronizer(MemoryBackend::with(vec![pulled.clone()]));
    push(&registry_a, pushed.clone());
    a.pull_latest().await.unwrap();

    let (b, registry_b) = synchronizer(MemoryBackend::with(vec![pulled]));
    b.pull_latest().await.unwrap();
    push(&registry_b, pushed);

    assert_eq!(a.notifications(), b.notifications());
    assert!(a.notifications()[0].read);
    assert_eq!(a.notifications()[0].title, "live");
}

#[tokio::test(start_paused = true)]
async fn poller_pulls_on_schedule_and_stops_when_cancelled() {
    use lib_realtime::ingestors::NotificationPoller;
    use tokio_util::sync::CancellationToken;

    let backend = MemoryBackend::with(vec![note("n1", 0, false)]);
    let (sync, _registry) = synchronizer(Arc::clone(&backend));
    let cancel = CancellationToken::new();
    let poller = NotificationPoller::new(sync.clone(), &config(), cancel.clone());
    let task = tokio::spawn(async move { poller.run().await });

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(backend.pulls.load(Ordering::SeqCst), 1);
    assert_eq!(sync.unread_count(), 1);

    backend.notifications.lock().unwrap().push(note("n2", 5, false));
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(backend.pulls.load(Ordering::SeqCst), 2);
    assert_eq!(sync.unread_count(), 2);

    // Failures back off to the retry delay.
    backend.fail_pulls.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(backend.pulls.load(Ordering::SeqCst), 3);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(backend.pulls.load(Ordering::SeqCst), 3);

    cancel.cancel();
    task.await.unwrap();
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(backend.pulls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn center_pages_through_the_filtered_list() {
    let mut seed: Vec<_> = (0..5).map(|n| note(&format!("n{n}"), n, false)).collect();
    seed[4].priority = Priority::High;
    seed[0].read = true;
    let backend = MemoryBackend::with(seed);
    let config = lib_realtime::RealtimeConfig { page_size: 2, ..config() };
    let sync = NotificationSynchronizer::new(Arc::clone(&backend), &config);

    let mut center = lib_realtime::views::NotificationCenter::new(sync.clone());
    assert!(center.has_more());
    center.refresh().await.unwrap();
    assert_eq!(center.visible().len(), 2);
    assert!(center.load_more().await.unwrap());
    assert!(center.load_more().await.unwrap());
    assert!(!center.has_more());
    assert!(!center.load_more().await.unwrap());
    assert_eq!(center.visible().len(), 5);

    center.set_filter(NotificationFilter { priority: Some(Priority::High), ..Default::default() });
    assert_eq!(center.visible().iter().map(|n| n.id.as_str()).collect::<Vec<_>>(), vec!["n4"]);

    center.set_filter(NotificationFilter { read: ReadFilter::Read, ..Default::default() });
    assert_eq!(center.delete_filtered().await.unwrap(), 1);
    assert_eq!(backend.calls(), vec!["delete_many 1".to_string()]);
    assert_eq!(sync.notifications().len(), 4);
}

#[tokio::test]
async fn bell_click_marks_read_and_returns_the_link() {
    let mut linked = note("n1", 0, false);
    linked.data = serde_json::from_value(json!({ "actionUrl": "/applications/42" })).unwrap();
    let backend = MemoryBackend::with(vec![linked, note("n2", 1, false)]);
    let (sync, _registry) = synchronizer(Arc::clone(&backend));
    sync.pull_latest().await.unwrap();

    let bell = lib_realtime::views::NotificationBell::new(sync.clone(), 1);
    let summary = bell.summary();
    assert_eq!(summary.unread, 2);
    assert_eq!(summary.recent.len(), 1);
    assert_eq!(summary.recent[0].id, id("n2"));

    assert_eq!(bell.open(&id("n1")).await.unwrap().as_deref(), Some("/applications/42"));
    assert_eq!(bell.summary().badge.as_deref(), Some("1"));
    assert_eq!(bell.open(&id("missing")).await.unwrap(), None);
}

#[tokio::test]
async fn registry_isolates_a_failing_notification_listener() {
    let backend = MemoryBackend::with(Vec::new());
    let (sync, registry) = synchronizer(backend);
    let failing = registry.on(EventKind::Notification, |_| anyhow::bail!("renderer crashed"));

    push(&registry, note("n1", 0, false));
    assert_eq!(sync.unread_count(), 1);
    assert!(failing.unsubscribe());
}

#[test]
fn snapshots_never_go_backwards_under_concurrent_pushes() {
    let (sync, registry) = synchronizer(MemoryBackend::with(Vec::new()));
    let done = AtomicBool::new(false);

    std::thread::scope(|scope| {
        let watcher = scope.spawn(|| {
            let mut last = 0;
            while !done.load(Ordering::SeqCst) {
                let version = sync.snapshot().version;
                assert!(version >= last, "snapshot went from version {last} to {version}");
                last = version;
            }
        });

        let writers: Vec<_> = (0..4)
            .map(|t| {
                let registry = &registry;
                scope.spawn(move || {
                    for i in 0..50 {
                        let mut notification = note(&format!("t{t}-{i}"), i % 60, false);
                        notification.title = format!("writer {t}");
                        push(registry, notification);
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        done.store(true, Ordering::SeqCst);
        watcher.join().unwrap();
    });

    let snapshot = sync.snapshot();
    assert_eq!(snapshot.unread, sync.unread_count());
    assert_eq!(snapshot.total, sync.notifications().len());
}
