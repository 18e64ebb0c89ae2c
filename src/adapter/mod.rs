//! Wire adapters: one protocol client per backend family.

pub mod http;
pub mod json_chat;
pub mod rest;
pub mod streaming;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{BackendConfig, BackendKind};
use crate::error::Result;
use crate::stream::StreamEventParser;
use crate::types::RawResult;

pub use json_chat::JsonChatAdapter;
pub use rest::GenericRestAdapter;
pub use streaming::StreamingEventsAdapter;

/// Result of one successful send.
#[derive(Debug, Clone, PartialEq)]
pub struct SendOutcome {
    pub raw: RawResult,
    /// Conversation identifier reported by the backend, if any.
    pub continuity_token: Option<String>,
}

/// Core trait implemented by every backend protocol client.
///
/// `send` is cancel-safe: dropping the future aborts the request.
#[async_trait]
pub trait WireAdapter: Send + Sync {
    /// Protocol family this adapter speaks.
    fn kind(&self) -> BackendKind;

    /// Send one user message. An empty `continuity_token` starts a new
    /// conversation on backends that track their own.
    async fn send(&self, message: &str, continuity_token: &str) -> Result<SendOutcome>;
}

/// Create the adapter for a backend config.
pub fn create_adapter(config: Arc<BackendConfig>) -> Result<Box<dyn WireAdapter>> {
    config.validate()?;
    Ok(match config.kind {
        BackendKind::StreamingEvents => Box::new(StreamingEventsAdapter::new(config)),
        BackendKind::JsonChat => Box::new(JsonChatAdapter::new(config)),
        BackendKind::GenericRest => Box::new(GenericRestAdapter::new(config)),
    })
}

/// Last non-empty `conversation_id` among the events of a stream body.
pub(crate) fn conversation_id_from_stream(body: &str) -> Option<String> {
    StreamEventParser::new(body)
        .filter_map(|event| event.decoded.as_ref().and_then(conversation_id))
        .last()
}

/// `conversation_id` of a decoded object, also under `data`.
pub(crate) fn conversation_id(value: &Value) -> Option<String> {
    value
        .get("conversation_id")
        .or_else(|| value.get("data")?.get("conversation_id"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_conversation_id_is_the_last_non_empty_one() {
        let body = "data: {\"conversation_id\":\"a\"}\n\
                    data: {\"conversation_id\":\"\"}\n\
                    data: {\"data\":{\"conversation_id\":\"b\"}}\n\
                    data: {\"content\":\"x\"}\n";
        assert_eq!(conversation_id_from_stream(body).as_deref(), Some("b"));
        assert_eq!(conversation_id_from_stream("data: hi\n"), None);
    }

    #[test]
    fn factory_validates_first() {
        let config = Arc::new(BackendConfig::new(
            BackendKind::StreamingEvents,
            "https://api.coze.cn/v3/chat",
        ));
        assert!(create_adapter(config).is_err());

        let config = Arc::new(BackendConfig::detect("https://api.dify.ai/v1/chat-messages"));
        assert_eq!(create_adapter(config).unwrap().kind(), BackendKind::JsonChat);
    }
}
