//! # Ingestors Module
//!
//! The two ways data enters the sync layer:
//!
//! - **`websocket`**: the live channel. A [`crate::core::transport::Connector`]
//!   over `tokio-tungstenite`, driven by the connection manager.
//! - **`notification_polling`**: a self-scheduling REST poller that merges
//!   page 1 of the notification list on an interval.

/// The WebSocket connector for the live channel.
#[cfg(feature = "websocket")]
pub mod websocket;
/// The periodic notification pull.
pub mod notification_polling;

pub use notification_polling::{NotificationPoller, PollResult};
#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnector;
