//! # WebSocket Connector
//!
//! Production [`Connector`]: opens the marketplace socket with
//! `tokio-tungstenite`, authenticating with the bearer credential in the
//! upgrade request, and bridges the stream onto a [`Link`].
//!
//! One task per link owns both halves of the socket. It ends when the server
//! closes, the stream errors, or the connection manager drops the link (the
//! outbound sender goes away), in which case a close frame is sent first.

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::core::transport::{Connector, Credential, DisconnectReason, Frame, Link, LinkEvent, TransportError};

/// Event name the server uses to end a session on purpose.
const SERVER_DISCONNECT_EVENT: &str = "disconnect";

pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Connector for WebSocketConnector {
    fn connect(&self, credential: &Credential) -> BoxFuture<'static, Result<Link, TransportError>> {
        let url = self.url.clone();
        let bearer = format!("Bearer {}", credential.expose());
        Box::pin(async move { open(&url, &bearer).await })
    }
}

async fn open(url: &str, bearer: &str) -> Result<Link, TransportError> {
    let mut request = url
        .into_client_request()
        .map_err(|e| TransportError::InvalidEndpoint(format!("{url}: {e}")))?;
    let header = HeaderValue::from_str(bearer)
        .map_err(|_| TransportError::Handshake("credential is not a valid header value".into()))?;
    request.headers_mut().insert(AUTHORIZATION, header);

    log::debug!("Opening WebSocket to {}", url);
    let (stream, _response) = connect_async(request).await.map_err(handshake_error)?;
    log::info!("WebSocket handshake with {} complete.", url);

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Frame>();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<LinkEvent>();

    tokio::spawn(async move {
        let (mut write, mut read) = stream.split();

        loop {
            tokio::select! {
                outgoing = outbound_rx.recv() => match outgoing {
                    Some(frame) => {
                        let text = match serde_json::to_string(&frame) {
                            Ok(text) => text,
                            Err(e) => {
                                log::error!("Could not encode outbound '{}': {}", frame.event, e);
                                continue;
                            }
                        };
                        if let Err(e) = write.send(Message::Text(text.into())).await {
                            log::error!("WSS Write Error: {}", e);
                            let _ = inbound_tx.send(LinkEvent::Closed(DisconnectReason::TransportError(e.to_string())));
                            break;
                        }
                    }
                    None => {
                        // The connection manager let go of the link.
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                },
                incoming = read.next() => {
                    let Some(event) = translate(incoming) else {
                        continue;
                    };
                    let closed = matches!(event, LinkEvent::Closed(_));
                    if inbound_tx.send(event).is_err() || closed {
                        break;
                    }
                }
            }
        }
        log::debug!("WebSocket task finished.");
    });

    Ok(Link { outbound: outbound_tx, inbound: inbound_rx })
}

fn handshake_error(error: WsError) -> TransportError {
    match error {
        WsError::Http(response) => {
            let status = response.status();
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                TransportError::Unauthorized(format!("HTTP {}", status.as_u16()))
            } else {
                TransportError::Handshake(format!("HTTP {}", status.as_u16()))
            }
        }
        WsError::Url(e) => TransportError::InvalidEndpoint(e.to_string()),
        other => TransportError::Handshake(other.to_string()),
    }
}

/// Maps one read result onto a link event. `None` means nothing to forward.
fn translate(incoming: Option<Result<Message, WsError>>) -> Option<LinkEvent> {
    match incoming {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<Frame>(text.as_str()) {
            Ok(frame) if frame.event == SERVER_DISCONNECT_EVENT => {
                let reason = frame
                    .data
                    .get("reason")
                    .and_then(|r| r.as_str())
                    .unwrap_or("io server disconnect")
                    .to_string();
                Some(LinkEvent::Closed(DisconnectReason::ServerInitiated(reason)))
            }
            Ok(frame) => Some(LinkEvent::Frame(frame)),
            Err(e) => {
                log::warn!("Ignoring text frame that is not an event envelope: {}", e);
                None
            }
        },
        Some(Ok(Message::Close(frame))) => Some(LinkEvent::Closed(close_reason(frame.as_ref()))),
        Some(Ok(Message::Binary(_))) => {
            log::debug!("Ignoring binary frame");
            None
        }
        Some(Ok(_)) => None,
        Some(Err(e)) => {
            log::error!("WSS Read Error: {}", e);
            Some(LinkEvent::Closed(DisconnectReason::TransportError(e.to_string())))
        }
        None => {
            log::warn!("WSS Stream closed by remote host.");
            Some(LinkEvent::Closed(DisconnectReason::TransportClose))
        }
    }
}

/// Going-away, abnormal, internal-error and restart codes are treated as
/// network drops; any other close code ends the session for good.
fn close_reason(frame: Option<&CloseFrame>) -> DisconnectReason {
    let Some(frame) = frame else {
        return DisconnectReason::TransportClose;
    };
    match frame.code {
        CloseCode::Away | CloseCode::Abnormal | CloseCode::Error | CloseCode::Restart | CloseCode::Again => {
            DisconnectReason::TransportClose
        }
        code => {
            let reason = frame.reason.as_str();
            let detail = if reason.is_empty() { format!("close code {}", u16::from(code)) } else { reason.to_string() };
            DisconnectReason::ServerInitiated(detail)
        }
    }
}
