//! # Notification Polling Ingestor
//!
//! The correctness backstop for the live socket: pushes can be missed while
//! offline or during a reconnect, so page 1 is pulled on a fixed schedule and
//! merged into the store.
//!
//! ## Key Design Principles:
//! - **Self-Scheduling**: the poller sleeps for the `next_delay` of each
//!   [`PollResult`] before polling again.
//! - **Resilience**: a failed pull is logged and retried after a fixed, longer
//!   delay.
//! - **Cancellation**: the loop ends as soon as its `CancellationToken` fires,
//!   whether it is polling or sleeping.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::configs::realtime_config::RealtimeConfig;
use crate::retrieve::backend::NotificationBackend;
use crate::sync::synchronizer::{NotificationSynchronizer, SyncError};

/// Outcome of one successful polling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollResult {
    /// Records returned by the server.
    pub fetched: usize,
    /// Unread count after merging.
    pub unread: usize,
    pub next_delay: Duration,
}

pub struct NotificationPoller<B> {
    sync: NotificationSynchronizer<B>,
    interval: Duration,
    retry_delay: Duration,
    cancel: CancellationToken,
}

impl<B: NotificationBackend> NotificationPoller<B> {
    pub fn new(sync: NotificationSynchronizer<B>, config: &RealtimeConfig, cancel: CancellationToken) -> Self {
        Self { sync, interval: config.poll_interval(), retry_delay: config.poll_retry_delay(), cancel }
    }

    /// Polls immediately, then on schedule, until cancelled.
    pub async fn run(&self) {
        log::info!("Notification poller started (every {:?}).", self.interval);

        loop {
            let ts_in = Instant::now();

            let delay = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.execute_poll() => match result {
                    Ok(result) => {
                        log::debug!(
                            "Poll fetched {} notification(s), {} unread, in {:?}",
                            result.fetched,
                            result.unread,
                            ts_in.elapsed()
                        );
                        result.next_delay
                    }
                    Err(e) => {
                        log::error!("Notification Polling Error: {}. Retrying in {:?}...", e, self.retry_delay);
                        self.retry_delay
                    }
                },
            };

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        log::info!("Notification poller stopped.");
    }

    async fn execute_poll(&self) -> Result<PollResult, SyncError> {
        let page = self.sync.pull_latest().await?;
        Ok(PollResult { fetched: page.notifications.len(), unread: self.sync.unread_count(), next_delay: self.interval })
    }
}
