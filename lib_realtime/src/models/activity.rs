use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// An entry of the activity feed: company activity or a newly posted
/// internship. The payload is kept as-is; the feed only orders and bounds it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    /// Socket event name the item arrived under.
    pub kind: String,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

impl ActivityItem {
    /// Short human-readable line, taken from the payload's `message` or
    /// `title` field when present.
    pub fn headline(&self) -> Option<&str> {
        self.payload
            .get("message")
            .or_else(|| self.payload.get("title"))
            .and_then(Value::as_str)
    }
}
