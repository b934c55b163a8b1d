//! # Core Engine Module
//!
//! The pieces that sit between the live socket and the consumers:
//!
//! - **`transport`**: the seam to the wire. A [`transport::Connector`] opens a
//!   [`transport::Link`] (a pair of frame channels); the WebSocket connector in
//!   `ingestors` is the production implementation.
//! - **`connection_manager`**: the actor that owns the single live link,
//!   enforces the connect throttle, runs the bounded reconnection policy and
//!   buffers emits while offline.
//! - **`registry`**: event-name to listener mapping with disposable
//!   subscription tokens and per-listener failure isolation.
//! - **`dispatcher`**: decodes wire frames into typed [`events::RealtimeEvent`]s.
//! - **`pending`**: the last-value-wins offline emit buffer.
//! - **`backoff`**: the reconnection delay curve.

/// Reconnection delay computation.
pub mod backoff;
/// The connection manager actor and its handle.
pub mod connection_manager;
/// Frame decoding into typed events.
pub mod dispatcher;
/// Typed inbound and outbound events.
pub mod events;
/// Offline emit buffer.
pub mod pending;
/// Listener registry.
pub mod registry;
/// Connector trait, links and frames.
pub mod transport;

pub use connection_manager::{ConnectionHandle, ConnectionManager, ConnectionState, ConnectionStatus};
pub use events::{EventKind, OutboundEvent, RealtimeEvent};
pub use registry::{EventRegistry, Subscription};
pub use transport::{Connector, Credential, Frame, Link, LinkEvent};
