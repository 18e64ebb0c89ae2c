//! The five extraction strategies.
//!
//! Each strategy proposes zero or more candidates from a [`Payload`]; the
//! selection rules live in the parent module.

use serde_json::{Map, Value};

use crate::stream::decode_json_values;
use crate::types::{ExtractionCandidate, ExtractionMethod};

use super::markers::{
    answer_label, has_tool_marker, is_blank, is_bookkeeping_text, is_noise, is_system_object,
    looks_like_tool_fragment, str_field, trailer_label, unescape, ANSWER_FIELDS,
    AUXILIARY_MESSAGE_TYPES, DELTA_EVENT_NAMES, TOOL_OUTPUT_FIELDS,
};
use super::payload::{Entry, Payload, Source};
use super::ContentExtractor;

/// Strategies in priority order.
pub(crate) const PIPELINE: [ExtractionMethod; 5] = [
    ExtractionMethod::NestedToolOutput,
    ExtractionMethod::DirectField,
    ExtractionMethod::Delimiter,
    ExtractionMethod::StreamDeltas,
    ExtractionMethod::Passthrough,
];

pub(crate) fn run(
    method: ExtractionMethod,
    extractor: &ContentExtractor,
    payload: &Payload<'_>,
    depth: u8,
) -> Vec<ExtractionCandidate> {
    match method {
        ExtractionMethod::NestedToolOutput => nested_tool_output(extractor, payload, depth),
        ExtractionMethod::DirectField => direct_fields(payload),
        ExtractionMethod::Delimiter => delimited(payload),
        ExtractionMethod::StreamDeltas => stream_deltas(payload).into_iter().collect(),
        ExtractionMethod::Passthrough => {
            passthrough(payload, extractor.config().passthrough_max_chars)
                .into_iter()
                .collect()
        }
    }
}

fn candidate(
    text: &str,
    method: ExtractionMethod,
    system: bool,
) -> Option<ExtractionCandidate> {
    let text = text.trim();
    if text.is_empty() || is_noise(text) {
        return None;
    }
    let bookkeeping = system || is_bookkeeping_text(text);
    Some(ExtractionCandidate::new(text.to_string(), method, bookkeeping))
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str(text.trim()).ok()? {
        Value::Object(object) => Some(object),
        _ => None,
    }
}

fn is_auxiliary(object: &Map<String, Value>) -> bool {
    str_field(object, "type").is_some_and(|kind| AUXILIARY_MESSAGE_TYPES.contains(&kind))
        || str_field(object, "role") == Some("user")
}

// Strategy 1

fn nested_tool_output(
    extractor: &ContentExtractor,
    payload: &Payload<'_>,
    depth: u8,
) -> Vec<ExtractionCandidate> {
    let mut found = Vec::new();
    for entry in &payload.entries {
        let Some(object) = entry.object() else {
            continue;
        };
        let system = is_system_object(object);

        let output = envelope_output(object, entry.name()).or_else(|| {
            // envelopes serialized into a string field of an ordinary message
            ["content", "data"]
                .iter()
                .filter_map(|field| str_field(object, field).and_then(parse_object))
                .find_map(|inner| envelope_output(&inner, None))
        });

        if let Some(text) = output.and_then(|value| recover(extractor, &value, depth)) {
            found.extend(candidate(&text, ExtractionMethod::NestedToolOutput, system));
        }
    }
    found
}

/// The output carried by an invocation envelope, if `object` is one.
fn envelope_output(object: &Map<String, Value>, event_name: Option<&str>) -> Option<Value> {
    if !has_tool_marker(object, event_name) {
        return None;
    }
    if let Some(value) = first_output(object) {
        return Some(value);
    }
    match object.get("arguments")? {
        Value::Object(arguments) => first_output(arguments),
        Value::String(encoded) => first_output(&parse_object(encoded)?),
        _ => None,
    }
}

fn first_output(object: &Map<String, Value>) -> Option<Value> {
    TOOL_OUTPUT_FIELDS
        .iter()
        .filter_map(|field| object.get(*field))
        .find(|value| !is_blank(value))
        .cloned()
}

/// Turn a tool output into answer text, re-running the pipeline when the
/// output is itself JSON.
fn recover(extractor: &ContentExtractor, value: &Value, depth: u8) -> Option<String> {
    let text = match value {
        Value::String(text) => text.clone(),
        Value::Null => return None,
        other => other.to_string(),
    };
    if decode_json_values(&text).is_none() {
        return Some(unescape(&text));
    }
    if depth >= extractor.config().max_depth {
        return None;
    }
    extractor
        .extract_nested(&text, depth + 1)
        .map(|extraction| extraction.answer)
}

// Strategy 2

fn direct_fields(payload: &Payload<'_>) -> Vec<ExtractionCandidate> {
    let mut found = Vec::new();
    for entry in &payload.entries {
        let Some(object) = entry.object() else {
            continue;
        };
        if payload.is_sequence() && is_delta(entry) {
            continue;
        }
        if has_tool_marker(object, entry.name()) || is_auxiliary(object) {
            continue;
        }
        if let Some(text) = flat_answer(object).or_else(|| nested_answer(object)) {
            found.extend(candidate(
                &unescape(text),
                ExtractionMethod::DirectField,
                is_system_object(object),
            ));
        }
    }
    found
}

fn usable_answer(text: &str) -> bool {
    !text.trim().is_empty()
        && decode_json_values(text).is_none()
        && !looks_like_tool_fragment(text)
}

fn flat_answer(object: &Map<String, Value>) -> Option<&str> {
    ANSWER_FIELDS
        .iter()
        .filter_map(|field| str_field(object, field))
        .find(|text| usable_answer(text))
}

fn nested_answer(object: &Map<String, Value>) -> Option<&str> {
    let data = object.get("data");
    data.and_then(Value::as_object)
        .and_then(|data| {
            ["answer", "message"]
                .iter()
                .filter_map(|field| str_field(data, field))
                .find(|text| usable_answer(text))
        })
        .or_else(|| data.and_then(|data| data.get("messages")).and_then(last_assistant))
        .or_else(|| data.and_then(last_assistant))
        .or_else(|| object.get("messages").and_then(last_assistant))
        .or_else(|| {
            object
                .get("last_message")
                .and_then(Value::as_object)
                .and_then(|message| str_field(message, "content"))
                .filter(|text| usable_answer(text))
        })
        .or_else(|| choice_content(object, "message"))
}

/// Content of the last assistant answer in a message list.
fn last_assistant(messages: &Value) -> Option<&str> {
    messages
        .as_array()?
        .iter()
        .rev()
        .filter_map(Value::as_object)
        .filter(|message| str_field(message, "role") == Some("assistant") && !is_auxiliary(message))
        .filter_map(|message| str_field(message, "content"))
        .find(|text| usable_answer(text))
}

/// `choices[0].<key>.content`, the chat-completions shape.
fn choice_content<'v>(object: &'v Map<String, Value>, key: &str) -> Option<&'v str> {
    object
        .get("choices")?
        .get(0)?
        .get(key)?
        .get("content")?
        .as_str()
}

// Strategy 3

fn delimited(payload: &Payload<'_>) -> Vec<ExtractionCandidate> {
    let plain = payload.plain_texts().collect::<Vec<_>>().join("\n");
    let mut views = vec![plain];
    views.extend(direct_fields(payload).into_iter().map(|c| c.text));
    views.extend(stream_deltas(payload).map(|c| c.text));

    views
        .iter()
        .filter_map(|view| after_answer_label(view))
        .filter_map(|section| candidate(&section, ExtractionMethod::Delimiter, false))
        .collect()
}

/// The text after an answer label, up to a trailing references section.
fn after_answer_label(text: &str) -> Option<String> {
    let label = answer_label().find(text)?;
    let rest = &text[label.end()..];
    let answer = match trailer_label().find(rest) {
        Some(trailer) => &rest[..trailer.start()],
        None => rest,
    };
    Some(answer.trim().to_string())
}

// Strategy 4

fn delta_chunk(entry: &Entry) -> Option<&str> {
    let object = entry.object()?;
    if let Some(name) = entry.name() {
        if name.ends_with(".delta") {
            return str_field(object, "content");
        }
        if DELTA_EVENT_NAMES.contains(&name) {
            return str_field(object, "answer");
        }
    }
    choice_content(object, "delta")
}

fn is_delta(entry: &Entry) -> bool {
    entry
        .name()
        .is_some_and(|name| name.ends_with(".delta") || DELTA_EVENT_NAMES.contains(&name))
        || entry
            .object()
            .and_then(|object| object.get("choices")?.get(0)?.get("delta"))
            .is_some()
}

fn stream_deltas(payload: &Payload<'_>) -> Option<ExtractionCandidate> {
    if !payload.is_sequence() {
        return None;
    }
    let mut text = String::new();
    let mut system = false;
    for entry in &payload.entries {
        let Some(chunk) = delta_chunk(entry) else {
            continue;
        };
        if entry.object().is_some_and(is_auxiliary) || looks_like_tool_fragment(chunk) {
            continue;
        }
        system |= entry.object().is_some_and(is_system_object);
        text.push_str(chunk);
    }
    candidate(&text, ExtractionMethod::StreamDeltas, system)
}

// Strategy 5

fn passthrough(payload: &Payload<'_>, max_chars: usize) -> Option<ExtractionCandidate> {
    let text = match payload.source {
        Source::Json => return None,
        Source::Text => payload.raw.to_string(),
        Source::Stream => payload.plain_texts().collect::<Vec<_>>().join("\n"),
    };
    if text.chars().count() > max_chars {
        return None;
    }
    candidate(&text, ExtractionMethod::Passthrough, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_drops_trailer() {
        assert_eq!(
            after_answer_label("思考过程……答案：北京是首都。参考依据：百科").as_deref(),
            Some("北京是首都。")
        );
        assert_eq!(
            after_answer_label("Reasoning. Answer: 42\nSources: the guide").as_deref(),
            Some("42")
        );
        assert_eq!(after_answer_label("no label here"), None);
    }

    #[test]
    fn envelope_output_reads_arguments() {
        let object = parse_object(r#"{"plugin_id":"7","arguments":{"result":"done"}}"#).unwrap();
        assert_eq!(envelope_output(&object, None), Some(Value::from("done")));

        let plain = parse_object(r#"{"content":"hello"}"#).unwrap();
        assert_eq!(envelope_output(&plain, None), None);
    }

    #[test]
    fn noise_is_not_a_candidate() {
        assert!(candidate("directly streaming reply", ExtractionMethod::DirectField, false).is_none());
        assert!(candidate("   ", ExtractionMethod::DirectField, false).is_none());
        let marked = candidate("用户画像信息: ...", ExtractionMethod::DirectField, false).unwrap();
        assert!(marked.is_system_bookkeeping);
    }
}
