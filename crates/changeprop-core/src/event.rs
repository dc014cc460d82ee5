use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The `meta` sub-record every event on the bus carries: `uri`,
/// `request_id`, `topic`, and an optional `domain`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventMeta {
    pub uri: String,
    pub request_id: String,
    pub topic: String,
    #[serde(default)]
    pub domain: Option<String>,
}

/// An opaque, schemaless JSON event. Payload fields beyond `meta` are kept
/// as a raw [`Value`] so rules can match arbitrary nested shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub meta: EventMeta,
    #[serde(flatten)]
    pub payload: Value,
}

#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("event payload is not valid JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),
}

impl Event {
    /// Decodes a raw bus payload. The discard-and-log behavior for a
    /// malformed payload lives in the consumer worker; this just reports
    /// the failure.
    pub fn decode(bytes: &[u8]) -> Result<Event, EventParseError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// The full event as a single JSON tree (`meta` plus payload fields),
    /// the shape the matcher and templates operate over.
    pub fn as_value(&self) -> Value {
        let mut merged = self.payload.clone();
        if let Value::Object(ref mut map) = merged {
            map.insert(
                "meta".to_string(),
                serde_json::to_value(&self.meta).unwrap_or(Value::Null),
            );
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_well_formed_event() {
        let raw = br#"{"meta":{"uri":"/a","request_id":"r1","topic":"t"},"message":"test"}"#;
        let event = Event::decode(raw).expect("valid json");
        assert_eq!(event.meta.uri, "/a");
        assert_eq!(event.as_value()["message"], "test");
    }

    #[test]
    fn rejects_non_json() {
        let raw = b"non-parsable-json";
        assert!(Event::decode(raw).is_err());
    }
}
