//! Raw backend replies.

use serde_json::Value;

/// Shape of a successful backend reply, as detected by the adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyPayload {
    /// A single JSON document (or the field selected from one).
    Json(Value),
    /// The body is an event stream; decode it from [`RawResult::body`].
    EventStream,
    /// Plain text, either the body or a field selected from it.
    Text(String),
    /// 2xx with nothing usable.
    Empty,
}

/// Everything a backend returned for one send.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResult {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
    pub payload: ReplyPayload,
}

impl RawResult {
    pub fn new(status: u16, content_type: Option<String>, body: String, payload: ReplyPayload) -> Self {
        Self {
            status,
            content_type,
            body,
            payload,
        }
    }

    /// A plain-text reply, mostly useful for tests and fixtures.
    pub fn text(body: impl Into<String>) -> Self {
        let body = body.into();
        Self::new(200, None, body.clone(), ReplyPayload::Text(body))
    }

    /// An event-stream reply.
    pub fn event_stream(body: impl Into<String>) -> Self {
        Self::new(
            200,
            Some("text/event-stream".to_string()),
            body.into(),
            ReplyPayload::EventStream,
        )
    }

    /// A JSON reply.
    pub fn json(value: Value) -> Self {
        Self::new(
            200,
            Some("application/json".to_string()),
            value.to_string(),
            ReplyPayload::Json(value),
        )
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.payload, ReplyPayload::Empty)
    }
}
