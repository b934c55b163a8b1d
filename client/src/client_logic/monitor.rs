use lib_realtime::views::badge_label;
use lib_realtime::{ConnectionHandle, EventKind, EventRegistry, RealtimeEvent, Subscription, SyncSnapshot};
use tokio::sync::{broadcast, watch};

/// One log line per inbound event worth showing to an operator.
pub fn describe(event: &RealtimeEvent) -> Option<String> {
    match event {
        RealtimeEvent::Notification(n) => Some(format!(
            "[{}] {} ({}): {}",
            n.priority.as_str(),
            n.title,
            n.kind.as_str(),
            n.message
        )),
        RealtimeEvent::NewMessage(m) => Some(format!("New message in {} from {}", m.conversation_id, m.sender)),
        RealtimeEvent::CompanyActivity(item) | RealtimeEvent::InternshipCreated(item) => {
            Some(format!("{}: {}", item.kind, item.headline().unwrap_or("(no details)")))
        }
        RealtimeEvent::ConnectError(failure) => Some(failure.to_string()),
        RealtimeEvent::Connected | RealtimeEvent::Disconnected(_) | RealtimeEvent::Custom { .. } => None,
    }
}

/// Logs every displayable event until the tokens are unsubscribed or the
/// registry is cleared.
pub fn attach_event_log(registry: &EventRegistry) -> Vec<Subscription> {
    [
        EventKind::Notification,
        EventKind::NewMessage,
        EventKind::CompanyActivity,
        EventKind::InternshipCreated,
        EventKind::ConnectError,
    ]
    .into_iter()
    .map(|kind| {
        registry.on(kind, |event| {
            if let Some(line) = describe(event) {
                match event {
                    RealtimeEvent::ConnectError(_) => log::error!("{}", line),
                    _ => log::info!("{}", line),
                }
            }
            Ok(())
        })
    })
    .collect()
}

/// Logs connection state transitions and unread-count changes until shutdown.
pub async fn run(
    connection: ConnectionHandle,
    mut snapshots: watch::Receiver<SyncSnapshot>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut status = connection.watch_status();
    let mut last_state = status.borrow().state;
    let mut last_unread = snapshots.borrow().unread;

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                log::info!("Monitor received shutdown signal.");
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                if current.state != last_state {
                    log::info!(
                        "Connection: {:?} -> {:?} (attempt {}, {} pending emit(s))",
                        last_state,
                        current.state,
                        current.attempt_count,
                        current.pending_emits
                    );
                    last_state = current.state;
                }
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let unread = snapshots.borrow_and_update().unread;
                if unread != last_unread {
                    log::info!("Unread notifications: {}", badge_label(unread).unwrap_or_else(|| "none".into()));
                    last_unread = unread;
                }
            }
        }
    }
}
