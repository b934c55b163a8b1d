//! # View Models
//!
//! Plain state holders a renderer draws from. None of them own notification
//! data: center and bell read the synchronizer, the feed and the conversation
//! view keep only what their own listeners received.

pub mod activity_feed;
pub mod bell;
pub mod center;
pub mod conversation;

pub use activity_feed::ActivityFeed;
pub use bell::{badge_label, BellSummary, NotificationBell};
pub use center::{NotificationCenter, NotificationFilter, ReadFilter};
pub use conversation::{ConversationError, ConversationView, Delivery, DisplayMessage};
