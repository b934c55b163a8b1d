//! # Frame Dispatcher
//!
//! Turns wire frames into typed [`RealtimeEvent`]s and hands them to the
//! [`EventRegistry`]. A frame whose payload does not match the shape its event
//! name promises is dropped here, with a warning, so malformed pushes never
//! reach the notification store or any other listener.

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;

use crate::core::events::{EventKind, RealtimeEvent};
use crate::core::registry::{DispatchReport, EventRegistry};
use crate::core::transport::Frame;
use crate::models::{ActivityItem, ChatMessage, Notification};

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("'{event}' payload is malformed: {detail}")]
    Malformed { event: String, detail: String },

    /// Local-only event names must not arrive from the server.
    #[error("'{0}' is reserved for local connection events")]
    Reserved(String),
}

/// Decodes one inbound frame.
pub fn decode(frame: &Frame) -> Result<RealtimeEvent, DecodeError> {
    let malformed = |detail: String| DecodeError::Malformed { event: frame.event.clone(), detail };

    match EventKind::from_name(&frame.event) {
        EventKind::Notification => Notification::from_value(frame.data.clone())
            .map(RealtimeEvent::Notification)
            .map_err(malformed),
        EventKind::NewMessage => serde_json::from_value::<ChatMessage>(frame.data.clone())
            .map(RealtimeEvent::NewMessage)
            .map_err(|e| malformed(e.to_string())),
        EventKind::CompanyActivity => activity(frame)
            .map(RealtimeEvent::CompanyActivity)
            .map_err(malformed),
        EventKind::InternshipCreated => activity(frame)
            .map(RealtimeEvent::InternshipCreated)
            .map_err(malformed),
        EventKind::Connected | EventKind::Disconnected | EventKind::ConnectError => {
            Err(DecodeError::Reserved(frame.event.clone()))
        }
        EventKind::Custom(name) => Ok(RealtimeEvent::Custom { name, data: frame.data.clone() }),
    }
}

fn activity(frame: &Frame) -> Result<ActivityItem, String> {
    if !frame.data.is_object() {
        return Err(format!("expected an object, got {}", json_type(&frame.data)));
    }
    Ok(ActivityItem {
        kind: frame.event.clone(),
        payload: frame.data.clone(),
        received_at: Utc::now(),
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Decodes `frame` and dispatches the result. Malformed frames are logged and
/// produce `None`.
pub fn dispatch_frame(registry: &EventRegistry, frame: &Frame) -> Option<DispatchReport> {
    match decode(frame) {
        Ok(event) => Some(registry.dispatch(&event)),
        Err(e) => {
            log::warn!("Dropping inbound frame: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_a_notification_push() {
        let frame = Frame::new(
            "notification",
            json!({
                "id": "n1",
                "type": "interview",
                "title": "Interview scheduled",
                "message": "Tuesday 10:00",
                "priority": "high",
                "read": false,
                "createdAt": "2026-10-18T10:00:00Z"
            }),
        );
        match decode(&frame).unwrap() {
            RealtimeEvent::Notification(n) => assert_eq!(n.id.as_str(), "n1"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn malformed_notification_is_rejected() {
        let frame = Frame::new("notification", json!({ "title": "no id" }));
        assert!(matches!(decode(&frame), Err(DecodeError::Malformed { .. })));
    }

    #[test]
    fn activity_requires_an_object() {
        let frame = Frame::new("internship:created", json!("Backend intern"));
        assert!(decode(&frame).is_err());

        let frame = Frame::new("internship:created", json!({ "title": "Backend intern" }));
        match decode(&frame).unwrap() {
            RealtimeEvent::InternshipCreated(item) => assert_eq!(item.headline(), Some("Backend intern")),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn reserved_names_are_not_accepted_from_the_wire() {
        let frame = Frame::new("connect", Value::Null);
        assert_eq!(decode(&frame), Err(DecodeError::Reserved("connect".into())));
    }

    #[test]
    fn malformed_frames_never_reach_listeners() {
        let registry = EventRegistry::new();
        let _sub = registry.on(EventKind::Notification, |_| panic!("must not be called"));
        assert_eq!(dispatch_frame(&registry, &Frame::new("notification", json!([1, 2]))), None);
    }

    #[test]
    fn unknown_events_pass_through_as_custom() {
        let frame = Frame::new("profile_viewed", json!({ "by": "acme" }));
        assert_eq!(
            decode(&frame).unwrap(),
            RealtimeEvent::Custom { name: "profile_viewed".into(), data: json!({ "by": "acme" }) }
        );
    }
}
