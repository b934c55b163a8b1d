//! # Notification Sync
//!
//! - **`store`**: the pure notification list and its merge rule.
//! - **`synchronizer`**: pushes, pulls and optimistic mutations on top of it.

pub mod store;
pub mod synchronizer;

pub use store::{merge, Inverse, Mutation, NotificationStore, Provenance, StoredNotification};
pub use synchronizer::{NotificationSynchronizer, SyncError, SyncSnapshot};
