//! # Realtime Configuration
//!
//! Every tunable of the live channel, the reconnection policy, the poller and
//! the view-models. All fields have defaults so a partial JSON document (or
//! none at all) produces a usable configuration.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a [`RealtimeConfig`] is rejected by [`RealtimeConfig::validate`].
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("reconnect max delay ({max_ms} ms) is smaller than the base delay ({base_ms} ms)")]
    DelayOrder { base_ms: u64, max_ms: u64 },

    #[error("reconnect jitter must be within 0.0..=1.0, got {0}")]
    Jitter(f64),
}

/// # Realtime Config
///
/// Durations are stored as integers (`*_ms` / `*_secs`) so the JSON form stays
/// readable; use the accessor methods to get [`Duration`]s.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RealtimeConfig {
    /// WebSocket endpoint of the real-time server.
    pub socket_url: String,
    /// Base URL of the REST API; relative paths are joined onto it.
    pub api_base_url: String,
    /// Maximum time from attempt start until the transport must confirm open.
    pub connect_timeout_ms: u64,
    /// Minimum spacing between two explicit connection attempts.
    pub connect_throttle_ms: u64,
    /// Reconnection attempts after a network-initiated drop before giving up.
    pub max_reconnect_attempts: u32,
    pub reconnect_base_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
    /// Share of each backoff delay that is randomized (0.0 disables jitter).
    pub reconnect_jitter: f64,
    /// Interval of the notification pull backstop.
    pub poll_interval_secs: u64,
    /// Delay before the poller retries after a failed pull.
    pub poll_retry_delay_secs: u64,
    /// Page size used by pulls and the notification center.
    pub page_size: u32,
    /// Upper bound of notifications held by the store.
    pub store_capacity: usize,
    /// Upper bound of items held by the activity feed.
    pub activity_capacity: usize,
    /// Number of notifications the bell shows.
    pub bell_recent_limit: usize,
    /// Outbound events that are queued individually instead of coalesced
    /// while the link is down.
    pub lossless_events: Vec<String>,
    /// Per-event cap for the lossless entries above.
    pub max_pending_per_event: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            socket_url: "ws://localhost:5000/ws".to_string(),
            api_base_url: "http://localhost:5000/api/".to_string(),
            connect_timeout_ms: 20_000,
            connect_throttle_ms: 2_000,
            max_reconnect_attempts: 5,
            reconnect_base_delay_ms: 1_000,
            reconnect_max_delay_ms: 5_000,
            reconnect_jitter: 0.5,
            poll_interval_secs: 30,
            poll_retry_delay_secs: 60,
            page_size: 20,
            store_capacity: 500,
            activity_capacity: 50,
            bell_recent_limit: 5,
            lossless_events: Vec::new(),
            max_pending_per_event: 32,
        }
    }
}

impl RealtimeConfig {
    /// Checks the invariants the components rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.socket_url.trim().is_empty() {
            return Err(ConfigError::EmptyField("socketUrl"));
        }
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::EmptyField("apiBaseUrl"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::ZeroValue("connectTimeoutMs"));
        }
        if self.reconnect_base_delay_ms == 0 {
            return Err(ConfigError::ZeroValue("reconnectBaseDelayMs"));
        }
        if self.reconnect_max_delay_ms < self.reconnect_base_delay_ms {
            return Err(ConfigError::DelayOrder {
                base_ms: self.reconnect_base_delay_ms,
                max_ms: self.reconnect_max_delay_ms,
            });
        }
        if !(0.0..=1.0).contains(&self.reconnect_jitter) || !self.reconnect_jitter.is_finite() {
            return Err(ConfigError::Jitter(self.reconnect_jitter));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::ZeroValue("pollIntervalSecs"));
        }
        if self.page_size == 0 {
            return Err(ConfigError::ZeroValue("pageSize"));
        }
        if self.store_capacity == 0 {
            return Err(ConfigError::ZeroValue("storeCapacity"));
        }
        if self.max_pending_per_event == 0 {
            return Err(ConfigError::ZeroValue("maxPendingPerEvent"));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn connect_throttle(&self) -> Duration {
        Duration::from_millis(self.connect_throttle_ms)
    }

    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn poll_retry_delay(&self) -> Duration {
        Duration::from_secs(self.poll_retry_delay_secs)
    }

    /// The lossless event names as a set, for the pending-emit queue.
    pub fn lossless_event_set(&self) -> HashSet<String> {
        self.lossless_events.iter().cloned().collect()
    }
}
