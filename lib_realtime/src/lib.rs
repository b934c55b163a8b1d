//! # lib_realtime
//!
//! Client-side real-time layer for the internship marketplace: a single live
//! socket to the server, a typed event registry in front of it, an offline
//! emit buffer, and a notification store kept consistent by push events with
//! periodic REST pulls as the backstop.
//!
//! The folder modules mirror the data flow:
//! `ingestors` (socket, poller) -> `core` (connection manager, registry)
//! -> `sync` (notification store) -> `views` (center, bell, feed, chat).

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod configs;
pub mod core;
pub mod ingestors;
pub mod models;
pub mod retrieve;
pub mod service;
pub mod session;
pub mod sync;
pub mod views;

// Re-export the types most callers need.
pub use configs::realtime_config::{ConfigError, RealtimeConfig};
pub use crate::core::connection_manager::{
    ConnectOutcome, ConnectionFailure, ConnectionHandle, ConnectionManager, ConnectionState,
    ConnectionStatus, EmitOutcome,
};
pub use crate::core::events::{EventKind, OutboundEvent, RealtimeEvent};
pub use crate::core::registry::{DispatchReport, EventRegistry, Subscription};
pub use crate::core::transport::{Connector, Credential, DisconnectReason, Frame, Link, LinkEvent, TransportError};
pub use models::notification::{Notification, NotificationId, NotificationType, Priority};
pub use retrieve::backend::{ApiError, MessagingBackend, NotificationBackend, NotificationQuery};
pub use service::RealtimeClient;
pub use sync::synchronizer::{NotificationSynchronizer, SyncError, SyncSnapshot};
