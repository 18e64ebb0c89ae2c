//! Arbitrary REST endpoints with loosely known field names.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use super::http::{backend_headers, execute, method, shared_client};
use super::{SendOutcome, WireAdapter};
use crate::config::{BackendConfig, BackendKind};
use crate::error::Result;
use crate::stream::looks_like_event_stream;
use crate::types::{RawResult, ReplyPayload};

/// Reply fields tried in order before falling back to any long string.
const REPLY_FIELDS: &[&str] = &["answer", "response", "message", "reply", "content"];

/// Shortest string accepted by the any-field fallback.
const MIN_FALLBACK_CHARS: usize = 10;

/// Adapter for endpoints with no known protocol.
///
/// These backends keep no conversation state of their own; the local
/// continuity token is sent along as `session_id`.
pub struct GenericRestAdapter {
    config: Arc<BackendConfig>,
}

impl GenericRestAdapter {
    pub fn new(config: Arc<BackendConfig>) -> Self {
        Self { config }
    }

    fn build_fields(&self, message: &str, continuity_token: &str) -> Map<String, Value> {
        let names: &[&str] = if self.config.raw_mode {
            &["input", "question", "query"]
        } else {
            &["message", "query"]
        };
        let mut fields: Map<String, Value> = names
            .iter()
            .map(|name| (name.to_string(), Value::from(message)))
            .collect();
        if !continuity_token.is_empty() {
            fields.insert("session_id".into(), Value::from(continuity_token));
        }
        fields
    }
}

/// Pick the reply out of a loosely structured body.
fn select_reply(body: &str) -> ReplyPayload {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return ReplyPayload::Empty;
    }
    let value = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => value,
        Err(_) if looks_like_event_stream(trimmed) => return ReplyPayload::EventStream,
        Err(_) => return ReplyPayload::Text(trimmed.to_string()),
    };

    let object = match value {
        Value::Object(object) => object,
        Value::String(text) if !text.trim().is_empty() => return ReplyPayload::Text(text),
        Value::Array(_) => return ReplyPayload::Json(value),
        _ => return ReplyPayload::Empty,
    };

    let named = REPLY_FIELDS
        .iter()
        .filter_map(|field| object.get(*field))
        .find(|value| !value.is_null());
    match named {
        Some(Value::String(text)) => return ReplyPayload::Text(text.clone()),
        Some(value @ (Value::Object(_) | Value::Array(_))) => {
            return ReplyPayload::Json(value.clone())
        }
        Some(other) => return ReplyPayload::Text(other.to_string()),
        None => {}
    }

    // First long string in document order.
    object
        .values()
        .filter_map(Value::as_str)
        .find(|text| text.chars().count() > MIN_FALLBACK_CHARS)
        .map(|text| ReplyPayload::Text(text.to_string()))
        .unwrap_or(ReplyPayload::Empty)
}

#[async_trait]
impl WireAdapter for GenericRestAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::GenericRest
    }

    async fn send(&self, message: &str, continuity_token: &str) -> Result<SendOutcome> {
        let method = method(&self.config)?;
        let fields = self.build_fields(message, continuity_token);
        let request = shared_client()
            .request(method.clone(), &self.config.endpoint)
            .headers(backend_headers(&self.config));
        let request = if method == reqwest::Method::GET {
            let query: Vec<(String, String)> = fields
                .into_iter()
                .map(|(key, value)| (key, value.as_str().unwrap_or_default().to_string()))
                .collect();
            request.query(&query)
        } else {
            request.json(&fields)
        };

        debug!(endpoint = %self.config.endpoint, %method, "generic_rest send");
        let reply = execute(&self.config, request).await?;
        let payload = select_reply(&reply.body);

        Ok(SendOutcome {
            raw: RawResult::new(reply.status, reply.content_type, reply.body, payload),
            continuity_token: None,
        })
    }
}
