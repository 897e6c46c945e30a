//! Inbound event discrimination.
//!
//! An invocation payload is one of exactly three things: a cleanup
//! trigger, a single booking event object, or an array of booking event
//! objects. The variant is resolved here, once; the engine never
//! re-inspects the raw JSON shape.

use std::fmt;

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// Payload was not an object or an array.
    UnsupportedPayload { kind: &'static str },
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventError::UnsupportedPayload { kind } => {
                write!(f, "unsupported payload type: {kind}")
            }
        }
    }
}

impl std::error::Error for EventError {}

/// The discriminated inbound payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Scheduled cleanup sweep; no specific booking.
    Cleanup,
    /// One booking event.
    Single(Value),
    /// A batch; items are processed strictly sequentially and results
    /// aggregate positionally.
    Batch(Vec<Value>),
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl InboundEvent {
    /// Classify a raw payload.
    ///
    /// An object whose `mode` is `"cleanup"`, or whose top-level `source`
    /// equals `scheduler_source`, triggers the sweep. Any other object is a
    /// single event; an array is a batch.
    pub fn classify(data: &Value, scheduler_source: &str) -> Result<Self, EventError> {
        match data {
            Value::Object(map) => {
                let mode = map
                    .get("mode")
                    .and_then(Value::as_str)
                    .map(|s| s.trim().to_lowercase())
                    .unwrap_or_default();
                if mode == "cleanup" {
                    return Ok(InboundEvent::Cleanup);
                }

                let source = map.get("source").and_then(Value::as_str).unwrap_or("");
                if !scheduler_source.is_empty() && source == scheduler_source {
                    return Ok(InboundEvent::Cleanup);
                }

                Ok(InboundEvent::Single(data.clone()))
            }
            Value::Array(items) => Ok(InboundEvent::Batch(items.clone())),
            other => Err(EventError::UnsupportedPayload {
                kind: json_kind(other),
            }),
        }
    }
}
