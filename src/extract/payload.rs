//! Normalized view of a reply body that every strategy reads from.

use std::borrow::Cow;

use serde_json::{Map, Value};

use crate::stream::{decode_json_values, looks_like_event_stream, StreamEventParser};
use crate::types::StreamEvent;

use super::markers::{is_bookkeeping_text, is_system_object, ANSWER_FIELDS, TOOL_OUTPUT_FIELDS};

/// Where a payload came from. Some strategies only apply to one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Source {
    Json,
    Stream,
    Text,
}

/// One decoded unit: a JSON value, a stream event, or a line of text.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub event_name: Option<String>,
    pub value: Option<Value>,
    pub text: String,
}

impl Entry {
    fn from_value(value: Value, event_name: Option<String>) -> Self {
        Self {
            event_name,
            text: value.to_string(),
            value: Some(value),
        }
    }

    fn from_event(event: StreamEvent) -> Self {
        let event_name = event.name().map(str::to_string);
        Self {
            event_name,
            value: event.decoded,
            text: event.raw_payload,
        }
    }

    pub fn object(&self) -> Option<&Map<String, Value>> {
        self.value.as_ref().and_then(Value::as_object)
    }

    pub fn name(&self) -> Option<&str> {
        self.event_name.as_deref()
    }

    /// Entries with anything an answer could come from.
    fn carries_content(&self) -> bool {
        match &self.value {
            None => !self.text.trim().is_empty(),
            Some(Value::Object(object)) => ANSWER_FIELDS
                .iter()
                .chain(TOOL_OUTPUT_FIELDS)
                .any(|field| object.get(*field).is_some_and(|v| !super::markers::is_blank(v))),
            Some(_) => false,
        }
    }

    fn is_bookkeeping(&self) -> bool {
        self.object().is_some_and(is_system_object) || is_bookkeeping_text(&self.text)
    }
}

pub(crate) struct Payload<'a> {
    pub source: Source,
    pub raw: Cow<'a, str>,
    pub entries: Vec<Entry>,
}

impl<'a> Payload<'a> {
    /// Detect the shape of free-form text: JSON, an event stream, or neither.
    pub fn from_text(text: &'a str) -> Self {
        if let Some(values) = decode_json_values(text) {
            return Self {
                source: Source::Json,
                raw: Cow::Borrowed(text),
                entries: flatten(values),
            };
        }
        if looks_like_event_stream(text) {
            return Self::from_stream(text);
        }
        Self {
            source: Source::Text,
            raw: Cow::Borrowed(text),
            entries: vec![Entry {
                event_name: None,
                value: None,
                text: text.to_string(),
            }],
        }
    }

    pub fn from_stream(body: &'a str) -> Self {
        Self::from_events(Cow::Borrowed(body), StreamEventParser::new(body))
    }

    pub fn from_events(raw: Cow<'a, str>, events: impl IntoIterator<Item = StreamEvent>) -> Self {
        Self {
            source: Source::Stream,
            raw,
            entries: events.into_iter().map(Entry::from_event).collect(),
        }
    }

    pub fn from_json(value: &Value) -> Payload<'static> {
        Payload {
            source: Source::Json,
            raw: Cow::Owned(value.to_string()),
            entries: flatten(vec![value.clone()]),
        }
    }

    pub fn raw_chars(&self) -> usize {
        self.raw.chars().count()
    }

    /// Non-JSON entries, in order.
    pub fn plain_texts(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|entry| entry.value.is_none())
            .map(|entry| entry.text.as_str())
    }

    /// A sequence of events rather than one document: a stream, or several
    /// JSON values (concatenated objects or a top-level array).
    pub fn is_sequence(&self) -> bool {
        match self.source {
            Source::Stream => true,
            Source::Json => self.entries.len() > 1,
            Source::Text => false,
        }
    }

    /// Whether the whole payload is agent bookkeeping and nothing else.
    ///
    /// Only payloads shorter than `threshold` characters qualify. A sequence
    /// qualifies when every content-bearing entry is bookkeeping.
    pub fn is_pure_bookkeeping(&self, threshold: usize) -> bool {
        if self.raw_chars() >= threshold {
            return false;
        }
        if self.is_sequence() {
            let mut content = self.entries.iter().filter(|e| e.carries_content()).peekable();
            return content.peek().is_some() && content.all(Entry::is_bookkeeping);
        }
        is_bookkeeping_text(&self.raw)
            || self
                .entries
                .iter()
                .any(|entry| entry.object().is_some_and(is_system_object))
    }
}

/// A top-level array becomes one entry per element. Each entry is named
/// after its JSON `event` field, if any.
fn flatten(values: Vec<Value>) -> Vec<Entry> {
    let mut entries = Vec::with_capacity(values.len());
    for value in values {
        match value {
            Value::Array(items) => entries.extend(items.into_iter().map(named_entry)),
            other => entries.push(named_entry(other)),
        }
    }
    entries
}

fn named_entry(value: Value) -> Entry {
    let name = value
        .get("event")
        .and_then(Value::as_str)
        .map(str::to_string);
    Entry::from_value(value, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_shapes() {
        assert_eq!(Payload::from_text("{\"a\":1}").source, Source::Json);
        assert_eq!(Payload::from_text("data: hi\n").source, Source::Stream);
        assert_eq!(Payload::from_text("hello").source, Source::Text);
    }

    #[test]
    fn arrays_flatten_into_entries() {
        let payload = Payload::from_json(&json!([{"a": 1}, {"b": 2}]));
        assert_eq!(payload.entries.len(), 2);
    }

    #[test]
    fn short_system_json_is_bookkeeping() {
        let payload = Payload::from_json(&json!({
            "msg_type": "time_capsule_recall",
            "data": "{\"wraped_text\":\"...\"}"
        }));
        assert!(payload.is_pure_bookkeeping(2_000));
        assert!(!payload.is_pure_bookkeeping(10));
    }

    #[test]
    fn stream_with_a_real_answer_is_not_bookkeeping() {
        let body = "data: {\"msg_type\":\"conversation_summary\",\"content\":\"x\"}\n\
                    data: {\"content\":\"Paris is the capital of France.\"}\n";
        assert!(!Payload::from_stream(body).is_pure_bookkeeping(2_000));

        let only = "data: {\"msg_type\":\"conversation_summary\",\"content\":\"x\"}\n\
                    data: {\"status\":\"completed\"}\n";
        assert!(Payload::from_stream(only).is_pure_bookkeeping(2_000));
    }

    #[test]
    fn concatenated_json_is_a_sequence() {
        let mixed = Payload::from_text(
            r#"{"msg_type":"conversation_summary","content":"summary"}{"answer":"The museum opens at nine."}"#,
        );
        assert!(mixed.is_sequence());
        assert!(!mixed.is_pure_bookkeeping(2_000));

        let only = Payload::from_json(&json!([
            {"msg_type": "conversation_summary", "content": "summary"},
            {"event": "message_end"}
        ]));
        assert!(only.is_pure_bookkeeping(2_000));
        assert_eq!(only.entries[1].name(), Some("message_end"));

        assert!(!Payload::from_json(&json!({"answer": "x"})).is_sequence());
    }
}
