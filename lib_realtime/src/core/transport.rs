//! # Transport Seam
//!
//! The connection manager never touches sockets directly. It asks a
//! [`Connector`] for a [`Link`]: an outbound frame sender plus an inbound
//! event receiver. Dropping the outbound sender closes the underlying
//! connection; the inbound side ends with exactly one [`LinkEvent::Closed`].

use std::fmt;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

/// Opaque bearer credential. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for empty or whitespace-only input.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// The envelope every socket message travels in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self { event: event.into(), data }
    }
}

/// Why a live link ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The server closed the session on purpose (revoked credential, replaced
    /// session, ban). Never retried automatically.
    ServerInitiated(String),
    /// This client asked for the disconnect.
    ClientInitiated,
    /// The connection went away without an application-level reason.
    TransportClose,
    TransportError(String),
    /// The transport did not confirm the open within the configured timeout.
    ConnectTimeout,
}

impl DisconnectReason {
    pub fn is_server_initiated(&self) -> bool {
        matches!(self, DisconnectReason::ServerInitiated(_))
    }

    /// Short reason code, in the vocabulary the marketplace server uses.
    pub fn as_str(&self) -> &str {
        match self {
            DisconnectReason::ServerInitiated(_) => "io server disconnect",
            DisconnectReason::ClientInitiated => "io client disconnect",
            DisconnectReason::TransportClose => "transport close",
            DisconnectReason::TransportError(_) => "transport error",
            DisconnectReason::ConnectTimeout => "connect timeout",
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::ServerInitiated(detail) | DisconnectReason::TransportError(detail)
                if !detail.is_empty() && detail != self.as_str() =>
            {
                write!(f, "{} ({})", self.as_str(), detail)
            }
            _ => f.write_str(self.as_str()),
        }
    }
}

/// Something that happened on an open link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Frame(Frame),
    Closed(DisconnectReason),
}

/// A live, authenticated channel as seen by the connection manager.
#[derive(Debug)]
pub struct Link {
    pub outbound: mpsc::UnboundedSender<Frame>,
    pub inbound: mpsc::UnboundedReceiver<LinkEvent>,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    /// The server refused the credential during the handshake.
    #[error("handshake rejected: {0}")]
    Unauthorized(String),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Opens links. Implementations must be cheap to call repeatedly: the
/// connection manager invokes `connect` once per (re)connection attempt and
/// applies its own timeout around the returned future.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, credential: &Credential) -> BoxFuture<'static, Result<Link, TransportError>>;
}
