//! Field names and marker tables shared by the extraction strategies.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

/// Fields that may hold a tool's output inside an invocation envelope, in
/// lookup order.
pub(crate) const TOOL_OUTPUT_FIELDS: &[&str] = &[
    "tool_output_content",
    "output",
    "result",
    "content",
    "answer",
    "response",
    "text",
    "data",
];

/// Keys whose presence marks an object as a tool invocation envelope.
pub(crate) const TOOL_MARKER_KEYS: &[&str] =
    &["plugin_id", "plugin_name", "arguments", "tool_output_content"];

/// Message `type` values used for tool results.
pub(crate) const TOOL_MESSAGE_TYPES: &[&str] = &["tool_response", "tool_output"];

/// `msg_type` announcing the end of a streamed plugin call.
pub(crate) const PLUGIN_FINISH_MSG_TYPE: &str = "stream_plugin_finish";

/// Flat answer fields, most specific first.
pub(crate) const ANSWER_FIELDS: &[&str] = &["answer", "content", "message", "reply", "text", "response"];

/// Message types that never carry the assistant's answer.
pub(crate) const AUXILIARY_MESSAGE_TYPES: &[&str] =
    &["verbose", "follow_up", "function_call", "knowledge"];

/// Event names whose payload is an incremental chunk.
pub(crate) const DELTA_EVENT_NAMES: &[&str] = &["message", "agent_message"];

/// `msg_type` values for agent bookkeeping messages.
pub(crate) const SYSTEM_MSG_TYPES: &[&str] =
    &["time_capsule_recall", "conversation_summary", "system_message"];

/// Text fragments that only appear in bookkeeping payloads (memory recall,
/// persona profiles, search plumbing).
pub(crate) const BOOKKEEPING_MARKERS: &[&str] = &[
    "time_capsule_recall",
    "conversation_summary",
    "\"msg_type\":\"system_message\"",
    "wraped_text",
    "origin_search_results",
    "用户编写的信息",
    "用户画像信息",
    "用户记忆点信息",
    "以下信息来源于用户与你对话",
    "避免使用隐私和敏感信息",
];

/// Status strings some backends emit in place of an answer.
pub(crate) const NOISE_REPLIES: &[&str] = &["directly streaming reply"];

pub(crate) fn answer_label() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\banswer\s*[:：]|答案\s*[:：]").expect("answer label regex must compile")
    })
}

pub(crate) fn trailer_label() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:references?|sources?)\s*[:：]|参考依据\s*[:：]|依据来源\s*[:：]")
            .expect("trailer label regex must compile")
    })
}

/// Whether free text contains a bookkeeping marker.
pub(crate) fn is_bookkeeping_text(text: &str) -> bool {
    let compact: String;
    let haystack = if text.contains("\": \"") {
        compact = text.replace("\": \"", "\":\"");
        compact.as_str()
    } else {
        text
    };
    BOOKKEEPING_MARKERS
        .iter()
        .any(|marker| haystack.contains(marker))
}

/// Whether an object is an agent bookkeeping message.
pub(crate) fn is_system_object(object: &Map<String, Value>) -> bool {
    object
        .get("msg_type")
        .and_then(Value::as_str)
        .is_some_and(|kind| SYSTEM_MSG_TYPES.contains(&kind))
}

/// Whether an object looks like a tool invocation envelope.
pub(crate) fn has_tool_marker(object: &Map<String, Value>, event_name: Option<&str>) -> bool {
    TOOL_MARKER_KEYS.iter().any(|key| object.contains_key(*key))
        || str_field(object, "msg_type") == Some(PLUGIN_FINISH_MSG_TYPE)
        || str_field(object, "type").is_some_and(|kind| TOOL_MESSAGE_TYPES.contains(&kind))
        || event_name.is_some_and(|name| name.ends_with("plugin.finish"))
}

/// Invocation fragments leaked into a text stream.
pub(crate) fn looks_like_tool_fragment(text: &str) -> bool {
    let text = text.trim_start();
    text.starts_with("{\"name\":\"")
        || text.contains("\"plugin_id\":")
        || text.contains("\"arguments\":")
}

pub(crate) fn is_noise(text: &str) -> bool {
    let text = text.trim();
    NOISE_REPLIES
        .iter()
        .any(|noise| text.eq_ignore_ascii_case(noise))
}

pub(crate) fn str_field<'v>(object: &'v Map<String, Value>, key: &str) -> Option<&'v str> {
    object.get(key).and_then(Value::as_str)
}

/// Null, blank strings and empty containers carry nothing.
pub(crate) fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}

/// Undo the double escaping of JSON-in-JSON payloads.
pub(crate) fn unescape(text: &str) -> String {
    text.replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\\"", "\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bookkeeping_markers_match_spaced_json() {
        assert!(is_bookkeeping_text("{\"msg_type\": \"system_message\"}"));
        assert!(is_bookkeeping_text("以下信息来源于用户与你对话"));
        assert!(!is_bookkeeping_text("The weather is fine."));
    }

    #[test]
    fn tool_markers() {
        let envelope = json!({"plugin_id": 1, "arguments": {}});
        assert!(has_tool_marker(envelope.as_object().unwrap(), None));
        let plain = json!({"content": "hi"});
        assert!(!has_tool_marker(plain.as_object().unwrap(), None));
        assert!(has_tool_marker(
            plain.as_object().unwrap(),
            Some("conversation.message.plugin.finish")
        ));
    }

    #[test]
    fn labels() {
        assert!(answer_label().is_match("Answer: yes"));
        assert!(answer_label().is_match("答案：是"));
        assert!(trailer_label().is_match("参考依据：文档"));
        assert!(!answer_label().is_match("answered"));
    }
}
