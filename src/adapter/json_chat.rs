//! JSON chat backends that may answer with a stream (Dify style).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::http::{backend_headers, execute, method, shared_client, HttpReply};
use super::{conversation_id, conversation_id_from_stream, SendOutcome, WireAdapter};
use crate::config::{BackendConfig, BackendKind};
use crate::error::Result;
use crate::stream::{decode_json_values, looks_like_event_stream};
use crate::types::{RawResult, ReplyPayload};

const USER: &str = "evaluation-user";
const RAW_USER: &str = "evaluation-user-raw";

/// Adapter for `/v1/chat-messages`-style endpoints.
pub struct JsonChatAdapter {
    config: Arc<BackendConfig>,
}

impl JsonChatAdapter {
    pub fn new(config: Arc<BackendConfig>) -> Self {
        Self { config }
    }

    fn build_request_body(&self, message: &str, continuity_token: &str) -> Value {
        let user = match (&self.config.user_id, self.config.raw_mode) {
            (Some(user), _) => user.as_str(),
            (None, true) => RAW_USER,
            (None, false) => USER,
        };
        json!({
            "inputs": {},
            "query": message,
            "response_mode": "streaming",
            "conversation_id": continuity_token,
            "user": user,
            "files": [],
        })
    }
}

/// Decide how a reply body should be read. The configured kind is a hint:
/// the body shape wins.
fn classify(reply: &HttpReply) -> (ReplyPayload, Option<String>) {
    let body = reply.body.trim();
    if body.is_empty() {
        return (ReplyPayload::Empty, None);
    }
    if !reply.is_event_stream() {
        match decode_json_values(body) {
            Some(values) if values.len() == 1 => {
                let value = values.into_iter().next().unwrap_or(Value::Null);
                let token = conversation_id(&value);
                return (ReplyPayload::Json(value), token);
            }
            Some(values) => {
                // concatenated objects without an enclosing array
                let token = values.iter().filter_map(conversation_id).last();
                return (ReplyPayload::Json(Value::Array(values)), token);
            }
            None => {}
        }
    }
    if reply.is_event_stream() || looks_like_event_stream(body) {
        return (
            ReplyPayload::EventStream,
            conversation_id_from_stream(&reply.body),
        );
    }
    (ReplyPayload::Text(body.to_string()), None)
}

#[async_trait]
impl WireAdapter for JsonChatAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::JsonChat
    }

    async fn send(&self, message: &str, continuity_token: &str) -> Result<SendOutcome> {
        let body = self.build_request_body(message, continuity_token);
        let request = shared_client()
            .request(method(&self.config)?, &self.config.endpoint)
            .headers(backend_headers(&self.config))
            .json(&body);

        debug!(
            endpoint = %self.config.endpoint,
            continued = !continuity_token.is_empty(),
            "json_chat send"
        );
        let reply = execute(&self.config, request).await?;
        let (payload, continuity_token) = classify(&reply);

        Ok(SendOutcome {
            raw: RawResult::new(reply.status, reply.content_type, reply.body, payload),
            continuity_token,
        })
    }
}
