//! Tolerant decoder for `event:`/`data:` response bodies.
//!
//! Backends stream replies as server-sent events but rarely follow the
//! format strictly: several JSON objects may share one `data:` line, a
//! non-JSON sentinel may close the stream, and some bodies are plain
//! newline-delimited JSON. [`StreamEventParser`] accepts all of these and
//! never gives up on the remaining lines because one line failed to decode.

use std::collections::VecDeque;
use std::str::Lines;

use serde_json::Value;

use crate::types::StreamEvent;

/// Payloads that mark the end of a stream rather than carry content.
const SENTINELS: &[&str] = &["[DONE]", "\"[DONE]\""];

/// Lazily decodes a response body into [`StreamEvent`]s.
///
/// The iterator is finite and single-pass; build a new parser to read the
/// same body again.
pub struct StreamEventParser<'a> {
    lines: Lines<'a>,
    event_name: Option<String>,
    pending: VecDeque<StreamEvent>,
}

impl<'a> StreamEventParser<'a> {
    pub fn new(body: &'a str) -> Self {
        Self {
            lines: body.lines(),
            event_name: None,
            pending: VecDeque::new(),
        }
    }

    fn consume_line(&mut self, line: &str) {
        let line = line.trim_end_matches('\r');
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with(':') {
            return;
        }

        if let Some(name) = field_value(trimmed, "event") {
            let name = name.trim();
            self.event_name = (!name.is_empty()).then(|| name.to_string());
        } else if let Some(data) = field_value(trimmed, "data") {
            self.push_data(data);
        } else if trimmed.starts_with('{') {
            // newline-delimited JSON without SSE framing
            self.push_data(trimmed);
        }
        // id:, retry: and anything else carry nothing we need
    }

    fn push_data(&mut self, payload: &str) {
        let content = payload.trim();
        if SENTINELS.contains(&content) {
            return;
        }

        match decode_json_values(content) {
            Some(values) if values.len() == 1 => {
                self.pending.push_back(StreamEvent {
                    event_name: self.event_name.clone(),
                    raw_payload: payload.to_string(),
                    decoded: values.into_iter().next(),
                });
            }
            Some(values) => {
                for value in values {
                    self.pending.push_back(StreamEvent {
                        event_name: self.event_name.clone(),
                        raw_payload: value.to_string(),
                        decoded: Some(value),
                    });
                }
            }
            None => self.pending.push_back(StreamEvent {
                event_name: self.event_name.clone(),
                raw_payload: payload.to_string(),
                decoded: None,
            }),
        }
    }
}

impl Iterator for StreamEventParser<'_> {
    type Item = StreamEvent;

    fn next(&mut self) -> Option<StreamEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            let line = self.lines.next()?;
            self.consume_line(line);
        }
    }
}

/// `name: value` → `value`, dropping a single leading space.
fn field_value<'l>(line: &'l str, name: &str) -> Option<&'l str> {
    let rest = line.strip_prefix(name)?.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// Decode one or more concatenated JSON objects/arrays.
///
/// Returns `None` unless the whole input is JSON and starts with `{` or `[`,
/// so bare strings and numbers stay plain text.
pub fn decode_json_values(input: &str) -> Option<Vec<Value>> {
    let input = input.trim();
    if !(input.starts_with('{') || input.starts_with('[')) {
        return None;
    }
    let values = serde_json::Deserializer::from_str(input)
        .into_iter::<Value>()
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    (!values.is_empty()).then_some(values)
}

/// Whether a body carries SSE framing.
pub fn looks_like_event_stream(body: &str) -> bool {
    body.lines().any(|line| {
        let line = line.trim_start();
        field_value(line, "data").is_some() || field_value(line, "event").is_some()
    })
}

/// Render plain text as an event-stream body, one `data:` line per text line.
///
/// Lines that are themselves JSON or a stream sentinel do not survive a
/// decode as plain text.
pub fn encode_text_event(text: &str) -> String {
    let mut body = String::with_capacity(text.len() + 32);
    for line in text.split('\n') {
        body.push_str("data: ");
        body.push_str(line);
        body.push('\n');
    }
    body.push_str("\ndata: [DONE]\n\n");
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn yields_one_event_per_json_data_line() {
        let body = "event: conversation.message.delta\n\
                    data: {\"content\":\"a\"}\n\n\
                    event: conversation.message.delta\n\
                    data: {\"content\":\"b\"}\n\n\
                    event: conversation.message.completed\n\
                    data: {\"content\":\"ab\"}\n\n\
                    event: done\n\
                    data: [DONE]\n";
        let events: Vec<_> = StreamEventParser::new(body).collect();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].decoded, Some(json!({"content": "a"})));
        assert_eq!(events[1].decoded, Some(json!({"content": "b"})));
        assert_eq!(
            events[2].event_name.as_deref(),
            Some("conversation.message.completed")
        );
    }

    #[test]
    fn event_name_sticks_until_replaced() {
        let body = "event: a\ndata: {\"x\":1}\ndata: {\"x\":2}\nevent: b\ndata: {\"x\":3}\n";
        let names: Vec<_> = StreamEventParser::new(body)
            .map(|e| e.event_name.unwrap())
            .collect();
        assert_eq!(names, vec!["a", "a", "b"]);
    }

    #[test]
    fn keeps_going_after_bad_lines() {
        let body = "data: {\"broken\":\ndata: not json at all\ndata: {\"ok\":true}\n";
        let events: Vec<_> = StreamEventParser::new(body).collect();
        assert_eq!(events.len(), 3);
        assert!(events[0].decoded.is_none());
        assert_eq!(events[1].raw_payload, "not json at all");
        assert_eq!(events[2].decoded, Some(json!({"ok": true})));
    }

    #[test]
    fn splits_concatenated_objects_on_one_line() {
        let body = "data: {\"a\":1}{\"b\":2} {\"c\":3}\n";
        let events: Vec<_> = StreamEventParser::new(body).collect();
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].decoded, Some(json!({"c": 3})));
    }

    #[test]
    fn skips_quoted_sentinel_comments_and_ids() {
        let body = ": keep-alive\nid: 7\nretry: 100\ndata: \"[DONE]\"\r\ndata: {\"a\":1}\r\n";
        let events: Vec<_> = StreamEventParser::new(body).collect();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn accepts_ndjson_without_prefixes() {
        let body = "{\"answer\":\"one\"}\n{\"answer\":\"two\"}\n";
        let events: Vec<_> = StreamEventParser::new(body).collect();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.event_name.is_none()));
    }

    #[test]
    fn data_without_space_is_accepted() {
        let events: Vec<_> = StreamEventParser::new("data:{\"a\":1}\nevent:x\ndata:hi\n").collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].event_name.as_deref(), Some("x"));
        assert_eq!(events[1].raw_payload, "hi");
    }

    #[test]
    fn scalars_stay_plain_text() {
        assert!(decode_json_values("42").is_none());
        assert!(decode_json_values("\"quoted\"").is_none());
        assert_eq!(decode_json_values("[1,2]"), Some(vec![json!([1, 2])]));
    }

    #[test]
    fn encoded_text_decodes_line_by_line() {
        let body = encode_text_event("first line\nsecond line");
        let payloads: Vec<_> = StreamEventParser::new(&body)
            .map(|e| e.raw_payload)
            .collect();
        assert_eq!(payloads, vec!["first line", "second line"]);
        assert!(looks_like_event_stream(&body));
        assert!(!looks_like_event_stream("just words"));
    }
}
