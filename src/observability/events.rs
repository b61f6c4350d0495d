//! Structured event records.
//!
//! Every admission decision, breaker transition, and dispatch outcome
//! is reported here as an [`Event`]. Logging, analytics aggregation,
//! and dashboards are pure consumers of this stream.

use std::collections::BTreeMap;

use serde::Serialize;

/// A typed event field value.
///
/// Replaces the loose string/any maps such records often accumulate:
/// values are one of a small set of variants so downstream consumers
/// can rely on the shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Map(BTreeMap<String, EventValue>),
}

impl From<&str> for EventValue {
    fn from(v: &str) -> Self {
        EventValue::Str(v.to_string())
    }
}

impl From<String> for EventValue {
    fn from(v: String) -> Self {
        EventValue::Str(v)
    }
}

impl From<i64> for EventValue {
    fn from(v: i64) -> Self {
        EventValue::Int(v)
    }
}

impl From<u32> for EventValue {
    fn from(v: u32) -> Self {
        EventValue::Int(v as i64)
    }
}

impl From<u64> for EventValue {
    fn from(v: u64) -> Self {
        EventValue::Int(v as i64)
    }
}

impl From<f64> for EventValue {
    fn from(v: f64) -> Self {
        EventValue::Float(v)
    }
}

impl From<bool> for EventValue {
    fn from(v: bool) -> Self {
        EventValue::Bool(v)
    }
}

impl From<BTreeMap<String, EventValue>> for EventValue {
    fn from(v: BTreeMap<String, EventValue>) -> Self {
        EventValue::Map(v)
    }
}

/// A structured event record.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// Event kind, e.g. `block_request` or `circuit_breaker_open`.
    pub kind: String,
    /// Event fields, keyed for deterministic serialization.
    pub fields: BTreeMap<String, EventValue>,
}

impl Event {
    /// Create an event with no fields.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Attach a field (builder style).
    pub fn field(mut self, key: impl Into<String>, value: impl Into<EventValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// Receiver for the event stream.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Event sink that writes each record as a JSON line through tracing.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: Event) {
        match serde_json::to_string(&event.fields) {
            Ok(fields) => {
                tracing::info!(target: "clickgate::events", kind = %event.kind, fields = %fields)
            }
            Err(e) => {
                tracing::warn!(kind = %event.kind, error = %e, "Failed to serialize event")
            }
        }
    }
}

/// In-memory sink for asserting emitted events in unit tests.
#[cfg(test)]
pub struct MemorySink {
    pub events: std::sync::Mutex<Vec<Event>>,
}

#[cfg(test)]
impl MemorySink {
    pub fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn kinds(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.kind.clone())
            .collect()
    }
}

#[cfg(test)]
impl EventSink for MemorySink {
    fn emit(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_value_serialization() {
        let mut nested = BTreeMap::new();
        nested.insert("inner".to_string(), EventValue::from(1i64));

        let event = Event::new("block_request")
            .field("reason", "suspicious_ua")
            .field("count", 3u32)
            .field("allowed", false)
            .field("extra", nested);

        let json = serde_json::to_string(&event.fields).unwrap();
        assert_eq!(
            json,
            r#"{"allowed":false,"count":3,"extra":{"inner":1},"reason":"suspicious_ua"}"#
        );
    }

    #[test]
    fn test_memory_sink_collects() {
        let sink = MemorySink::new();
        sink.emit(Event::new("a"));
        sink.emit(Event::new("b").field("ip", "1.2.3.4"));
        assert_eq!(sink.kinds(), vec!["a", "b"]);
    }
}
