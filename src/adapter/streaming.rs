//! Event-stream chat backends with nested plugin payloads (Coze v3 style).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::http::{backend_headers, billing_failure, execute, method, shared_client};
use super::{conversation_id_from_stream, SendOutcome, WireAdapter};
use crate::config::{BackendConfig, BackendKind};
use crate::error::{ParleyError, Result};
use crate::types::{RawResult, ReplyPayload};

const DEFAULT_USER_ID: &str = "evaluation-user";

/// Adapter for `/v3/chat`-style streaming endpoints.
pub struct StreamingEventsAdapter {
    config: Arc<BackendConfig>,
}

impl StreamingEventsAdapter {
    pub fn new(config: Arc<BackendConfig>) -> Self {
        Self { config }
    }

    fn build_request_body(&self, message: &str) -> Result<Value> {
        let bot_id = self.config.target_id().ok_or_else(|| {
            ParleyError::Configuration(
                "streaming_events backends require a bot_id or agent_id".into(),
            )
        })?;
        Ok(json!({
            "bot_id": bot_id,
            "user_id": self.config.user_id.as_deref().unwrap_or(DEFAULT_USER_ID),
            "stream": true,
            "auto_save_history": true,
            "parameters": {},
            "additional_messages": [{
                "role": "user",
                "type": "question",
                "content_type": "text",
                "content": message,
            }],
        }))
    }
}

#[async_trait]
impl WireAdapter for StreamingEventsAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::StreamingEvents
    }

    async fn send(&self, message: &str, continuity_token: &str) -> Result<SendOutcome> {
        let body = self.build_request_body(message)?;
        let mut request = shared_client()
            .request(method(&self.config)?, &self.config.endpoint)
            .headers(backend_headers(&self.config))
            .json(&body);
        if !continuity_token.is_empty() {
            request = request.query(&[("conversation_id", continuity_token)]);
        }

        debug!(
            endpoint = %self.config.endpoint,
            continued = !continuity_token.is_empty(),
            "streaming_events send"
        );
        let reply = execute(&self.config, request).await?;

        if let Some(err) = billing_failure(&reply.body) {
            return Err(err);
        }

        let continuity_token = conversation_id_from_stream(&reply.body);
        let payload = if reply.body.trim().is_empty() {
            ReplyPayload::Empty
        } else {
            ReplyPayload::EventStream
        };
        Ok(SendOutcome {
            raw: RawResult::new(reply.status, reply.content_type, reply.body, payload),
            continuity_token,
        })
    }
}
