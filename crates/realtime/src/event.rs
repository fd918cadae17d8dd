//! Messages carried on the live channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One message on the live pub/sub channel, JSON-encoded with a `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    ConnectionCount { count: i64 },
    Notification { payload: Value },
}

impl LiveEvent {
    /// SSE event name.
    pub fn event_name(&self) -> &'static str {
        match self {
            LiveEvent::ConnectionCount { .. } => "connection_count",
            LiveEvent::Notification { .. } => "notification",
        }
    }

    /// SSE data line: the bare integer for counts, the payload JSON for
    /// notifications.
    pub fn data(&self) -> String {
        match self {
            LiveEvent::ConnectionCount { count } => count.to_string(),
            LiveEvent::Notification { payload } => payload.to_string(),
        }
    }

    pub fn is_count(&self) -> bool {
        matches!(self, LiveEvent::ConnectionCount { .. })
    }

    pub fn to_wire(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Decode a channel payload. Foreign or malformed messages yield `None`.
pub fn parse_live_message(payload: &str) -> Option<LiveEvent> {
    serde_json::from_str(payload).ok()
}
