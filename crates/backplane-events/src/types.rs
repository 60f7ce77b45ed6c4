//! Event and delivery-state data model (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A discrete record of log or status-change activity within a build.
///
/// Within one build, `id` is strictly increasing by 1 starting at 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

/// The two event kinds a build emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum EventPayload {
    Log { message: String },
    StatusChange { status: String },
}

impl Event {
    pub fn log(id: u64, message: impl Into<String>) -> Self {
        Self {
            id,
            ts: Utc::now(),
            payload: EventPayload::Log {
                message: message.into(),
            },
        }
    }

    pub fn status_change(id: u64, status: impl Into<String>) -> Self {
        Self {
            id,
            ts: Utc::now(),
            payload: EventPayload::StatusChange {
                status: status.into(),
            },
        }
    }
}

/// Per-build webhook delivery progress (spec §3 `DeliveryState`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeliveryState {
    /// Epoch milliseconds of the next attempt; 0 = none scheduled.
    pub next_attempt_at: i64,
    /// Consecutive failed attempts since the last success; 0 after success.
    pub attempt: u32,
}

/// The outbound webhook payload (spec §6): `{buildId, events:[...]}`.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookBatch<'a> {
    pub build_id: &'a str,
    pub events: &'a [Event],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_with_tagged_payload() {
        let event = Event::log(0, "hello");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "log");
        assert_eq!(value["payload"]["message"], "hello");
    }

    #[test]
    fn status_change_round_trips() {
        let event = Event::status_change(1, "building");
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
