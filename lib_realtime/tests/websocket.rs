#![cfg(feature = "websocket")]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use lib_realtime::ingestors::WebSocketConnector;
use lib_realtime::{Connector, Credential, DisconnectReason, Frame, LinkEvent, TransportError};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{self, StatusCode};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

const WAIT: Duration = Duration::from_secs(5);

type ServerStream = WebSocketStream<tokio::net::TcpStream>;

/// Accepts one upgrade. Requests without `Bearer good-token` get a 401.
async fn serve_once() -> (String, tokio::task::JoinHandle<Option<ServerStream>>, Arc<Mutex<Option<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/socket", listener.local_addr().unwrap());
    let seen = Arc::new(Mutex::new(None));

    let header = Arc::clone(&seen);
    let task = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let check = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let auth = request.headers().get(http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()).map(str::to_string);
            *header.lock().unwrap() = auth.clone();
            if auth.as_deref() == Some("Bearer good-token") {
                Ok(response)
            } else {
                Err(http::Response::builder().status(StatusCode::UNAUTHORIZED).body(Some("invalid token".into())).unwrap())
            }
        };
        tokio_tungstenite::accept_hdr_async(tcp, check).await.ok()
    });

    (url, task, seen)
}

fn credential(raw: &str) -> Credential {
    Credential::new(raw).unwrap()
}

async fn next_text(server: &mut ServerStream) -> serde_json::Value {
    loop {
        match timeout(WAIT, server.next()).await.unwrap() {
            Some(Ok(Message::Text(text))) => return serde_json::from_str(text.as_str()).unwrap(),
            Some(Ok(_)) => continue,
            other => panic!("expected a text frame, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn frames_flow_both_ways_with_the_bearer_header() {
    let (url, task, seen) = serve_once().await;
    let connector = WebSocketConnector::new(url);

    let mut link = connector.connect(&credential("good-token")).await.unwrap();
    let mut server = task.await.unwrap().expect("upgrade accepted");
    assert_eq!(seen.lock().unwrap().as_deref(), Some("Bearer good-token"));

    let push = json!({ "event": "company_activity", "data": { "title": "Acme is hiring" } });
    server.send(Message::Text(push.to_string().into())).await.unwrap();
    match timeout(WAIT, link.inbound.recv()).await.unwrap() {
        Some(LinkEvent::Frame(frame)) => assert_eq!(frame, Frame::new("company_activity", json!({ "title": "Acme is hiring" }))),
        other => panic!("unexpected {other:?}"),
    }

    link.outbound.send(Frame::new("typing", json!({ "conversationId": "c1", "isTyping": true }))).unwrap();
    assert_eq!(next_text(&mut server).await, json!({ "event": "typing", "data": { "conversationId": "c1", "isTyping": true } }));

    // Letting go of the link closes the socket from the client side.
    drop(link);
    loop {
        match timeout(WAIT, server.next()).await.unwrap() {
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
            Some(Ok(_)) => continue,
        }
    }
}

#[tokio::test]
async fn server_disconnect_event_ends_the_link() {
    let (url, task, _) = serve_once().await;
    let mut link = WebSocketConnector::new(url).connect(&credential("good-token")).await.unwrap();
    let mut server = task.await.unwrap().unwrap();

    let goodbye = json!({ "event": "disconnect", "data": { "reason": "session replaced" } });
    server.send(Message::Text(goodbye.to_string().into())).await.unwrap();

    assert_eq!(
        timeout(WAIT, link.inbound.recv()).await.unwrap(),
        Some(LinkEvent::Closed(DisconnectReason::ServerInitiated("session replaced".into())))
    );
}

#[tokio::test]
async fn dropped_tcp_connection_is_a_transport_close() {
    let (url, task, _) = serve_once().await;
    let mut link = WebSocketConnector::new(url).connect(&credential("good-token")).await.unwrap();
    drop(task.await.unwrap());

    match timeout(WAIT, link.inbound.recv()).await.unwrap() {
        Some(LinkEvent::Closed(reason)) => assert!(!reason.is_server_initiated(), "got {reason:?}"),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn rejected_credential_is_unauthorized() {
    let (url, task, seen) = serve_once().await;

    let error = WebSocketConnector::new(url).connect(&credential("stale-token")).await.unwrap_err();

    assert_eq!(error, TransportError::Unauthorized("HTTP 401".into()));
    assert!(task.await.unwrap().is_none());
    assert_eq!(seen.lock().unwrap().as_deref(), Some("Bearer stale-token"));
}

#[tokio::test]
async fn malformed_url_is_an_invalid_endpoint() {
    let error = WebSocketConnector::new("not a url").connect(&credential("good-token")).await.unwrap_err();
    assert!(matches!(error, TransportError::InvalidEndpoint(_)), "got {error:?}");
}
