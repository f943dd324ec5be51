//! Event types for the append-only run log.
//!
//! A run is described entirely by its ordered list of events. The same
//! `Event` value feeds the live stream and the recorded log, so a replay
//! reproduces the original frames exactly.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::role::AgentRole;

/// A single record in a run's event log.
///
/// `data` holds the wire payload exactly as it was first emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Kind of event (named frame type on the wire)
    pub event: EventKind,

    /// Payload, always carrying a `ts` field
    pub data: Value,
}

impl Event {
    /// Human-readable progress line from a role
    pub fn log(ts: DateTime<Utc>, agent: AgentRole, message: impl Into<String>) -> Self {
        Self {
            event: EventKind::Log,
            data: json!({
                "ts": format_ts(ts),
                "agent": agent,
                "message": message.into(),
            }),
        }
    }

    /// Validated output of one stage
    pub fn raw(ts: DateTime<Utc>, agent: AgentRole, payload: Value) -> Self {
        Self {
            event: EventKind::Raw,
            data: json!({
                "ts": format_ts(ts),
                "agent": agent,
                "payload": payload,
            }),
        }
    }

    /// The finished markdown artifact
    pub fn final_memo(ts: DateTime<Utc>, markdown: impl Into<String>) -> Self {
        Self {
            event: EventKind::Final,
            data: json!({
                "ts": format_ts(ts),
                "markdown": markdown.into(),
            }),
        }
    }

    /// A fatal failure; `details` is omitted from the payload when absent
    pub fn error(ts: DateTime<Utc>, message: impl Into<String>, details: Option<Value>) -> Self {
        let mut data = json!({
            "ts": format_ts(ts),
            "message": message.into(),
        });
        if let (Some(details), Some(map)) = (details, data.as_object_mut()) {
            map.insert("details".to_string(), details);
        }
        Self {
            event: EventKind::Error,
            data,
        }
    }

    /// Terminal marker, last event of every run
    pub fn done(ts: DateTime<Utc>) -> Self {
        Self {
            event: EventKind::Done,
            data: json!({ "ts": format_ts(ts) }),
        }
    }

    /// Role attributed to this event, if any
    pub fn agent(&self) -> Option<AgentRole> {
        self.data
            .get("agent")
            .and_then(Value::as_str)
            .and_then(AgentRole::from_name)
    }

    /// Decode the payload into one of the typed views below
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.data.clone())
    }
}

/// Named frame types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Log,
    Raw,
    Final,
    Error,
    Done,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Log => "log",
            EventKind::Raw => "raw",
            EventKind::Final => "final",
            EventKind::Error => "error",
            EventKind::Done => "done",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogData {
    pub ts: String,
    pub agent: AgentRole,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawData {
    pub ts: String,
    pub agent: AgentRole,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FinalData {
    pub ts: String,
    pub markdown: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorData {
    pub ts: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<Value>,
}

/// ISO 8601 with millisecond precision and a `Z` suffix
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_log_event_payload() {
        let event = Event::log(fixed_ts(), AgentRole::NewsResearcher, "searching…");
        assert_eq!(event.event, EventKind::Log);
        assert_eq!(event.agent(), Some(AgentRole::NewsResearcher));

        let data: LogData = event.decode().unwrap();
        assert_eq!(data.ts, "2025-03-01T12:30:00.000Z");
        assert_eq!(data.message, "searching…");
    }

    #[test]
    fn test_error_without_details_omits_field() {
        let event = Event::error(fixed_ts(), "boom", None);
        assert!(event.data.get("details").is_none());

        let event = Event::error(fixed_ts(), "boom", Some(json!({"kind": "no_output"})));
        let data: ErrorData = event.decode().unwrap();
        assert_eq!(data.details, Some(json!({"kind": "no_output"})));
    }

    #[test]
    fn test_stored_event_serialization() {
        let event = Event::done(fixed_ts());
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"event":"done","data":{"ts":"2025-03-01T12:30:00.000Z"}}"#);

        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_final_has_no_agent() {
        let event = Event::final_memo(fixed_ts(), "# Memo");
        assert_eq!(event.agent(), None);
        let data: FinalData = event.decode().unwrap();
        assert_eq!(data.markdown, "# Memo");
    }
}
