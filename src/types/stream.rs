//! Streaming types.

use serde_json::{Map, Value};

/// One decoded `data:` payload of an event stream.
///
/// Events live only while a single reply is being decoded; they are never
/// stored on a [`Turn`](super::Turn).
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    /// Name from the most recent `event:` line, if any.
    pub event_name: Option<String>,
    /// The payload text after the `data:` prefix.
    pub raw_payload: String,
    /// Decoded JSON when the payload is an object or array.
    pub decoded: Option<Value>,
}

impl StreamEvent {
    /// Effective event name: the SSE `event:` name, else a JSON `event` field.
    pub fn name(&self) -> Option<&str> {
        self.event_name
            .as_deref()
            .or_else(|| self.object()?.get("event")?.as_str())
    }

    /// Decoded JSON object, if the payload was one.
    pub fn object(&self) -> Option<&Map<String, Value>> {
        self.decoded.as_ref()?.as_object()
    }

    pub fn is_json(&self) -> bool {
        self.decoded.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn name_falls_back_to_json_event_field() {
        let event = StreamEvent {
            event_name: None,
            raw_payload: String::new(),
            decoded: Some(json!({"event": "message", "answer": "hi"})),
        };
        assert_eq!(event.name(), Some("message"));

        let named = StreamEvent {
            event_name: Some("conversation.message.delta".into()),
            ..event
        };
        assert_eq!(named.name(), Some("conversation.message.delta"));
    }
}
