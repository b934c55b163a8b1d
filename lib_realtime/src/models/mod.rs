//! # Domain Models
//!
//! Wire-compatible data types exchanged with the marketplace server, both
//! over the live socket and the REST API.

/// Notifications pushed over the socket or pulled over REST.
pub mod notification;
/// Conversations and chat messages.
pub mod message;
/// Company activity and new-internship feed items.
pub mod activity;

pub use activity::ActivityItem;
pub use message::{ChatMessage, Conversation};
pub use notification::{Notification, NotificationData, NotificationId, NotificationPage, NotificationType, Priority};
