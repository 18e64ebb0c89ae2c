//! Target backend description.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{ParleyError, Result};

/// Default per-call timeout for target backends.
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(60);

/// Regions a streaming backend is hosted in.
pub const KNOWN_REGIONS: &[&str] = &["global", "china"];

/// Chat endpoint of the hosted streaming service for `region`.
pub fn regional_endpoint(region: Option<&str>) -> &'static str {
    match region {
        Some(region) if region.eq_ignore_ascii_case("china") => "https://api.coze.cn/v3/chat",
        _ => "https://api.coze.com/v3/chat",
    }
}

/// Wire protocol family spoken by a target backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BackendKind {
    /// `event:`/`data:` streams with nested plugin payloads (Coze-style).
    StreamingEvents,
    /// JSON chat endpoint that may also answer with a stream (Dify-style).
    JsonChat,
    /// Arbitrary REST endpoint with loosely known field names.
    GenericRest,
}

impl BackendKind {
    /// Guess the protocol family from an endpoint URL.
    pub fn detect(url: &str) -> Self {
        let lower = url.to_ascii_lowercase();
        if lower.contains("/v1/chat-messages") || lower.contains("dify") {
            Self::JsonChat
        } else if lower.contains("coze") {
            Self::StreamingEvents
        } else {
            Self::GenericRest
        }
    }

    /// Whether the backend assigns its own conversation identifiers.
    pub fn has_native_continuity(self) -> bool {
        !matches!(self, Self::GenericRest)
    }
}

/// Connection details for one target backend. Immutable once a session starts.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub endpoint: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub timeout: Duration,
    pub bot_id: Option<String>,
    pub agent_id: Option<String>,
    pub region: Option<String>,
    pub user_id: Option<String>,
    /// Send the generated text in "raw user input" payload fields.
    pub raw_mode: bool,
}

impl BackendConfig {
    pub fn new(kind: BackendKind, endpoint: impl Into<String>) -> Self {
        Self {
            kind,
            endpoint: endpoint.into(),
            method: "POST".to_string(),
            headers: HashMap::new(),
            timeout: DEFAULT_BACKEND_TIMEOUT,
            bot_id: None,
            agent_id: None,
            region: None,
            user_id: None,
            raw_mode: false,
        }
    }

    /// Build a config whose kind is detected from the endpoint.
    pub fn detect(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        Self::new(BackendKind::detect(&endpoint), endpoint)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_bearer_token(self, token: &str) -> Self {
        self.with_header("Authorization", format!("Bearer {token}"))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_bot_id(mut self, bot_id: impl Into<String>) -> Self {
        self.bot_id = Some(bot_id.into());
        self
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_raw_mode(mut self, raw_mode: bool) -> Self {
        self.raw_mode = raw_mode;
        self
    }

    /// Id the backend routes to: the bot id, else the agent id.
    pub fn target_id(&self) -> Option<&str> {
        self.bot_id.as_deref().or(self.agent_id.as_deref())
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Token from the `Authorization` header, without a `Bearer ` prefix.
    pub fn bearer_token(&self) -> Option<&str> {
        let value = self.header("authorization")?.trim();
        let token = match value.get(..7) {
            Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => value[7..].trim(),
            _ => value,
        };
        (!token.is_empty()).then_some(token)
    }

    /// Check the config before any network call is made.
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.endpoint).map_err(|e| {
            ParleyError::Configuration(format!("invalid endpoint '{}': {e}", self.endpoint))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ParleyError::Configuration(format!(
                "unsupported endpoint scheme '{}'",
                url.scheme()
            )));
        }
        reqwest::Method::from_bytes(self.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| ParleyError::Configuration(format!("invalid method '{}'", self.method)))?;
        if self.timeout.is_zero() {
            return Err(ParleyError::Configuration("backend timeout must be non-zero".into()));
        }
        if self.kind == BackendKind::StreamingEvents && self.target_id().is_none() {
            return Err(ParleyError::Configuration(
                "streaming_events backends require a bot_id or agent_id".into(),
            ));
        }
        if let Some(region) = &self.region {
            if !KNOWN_REGIONS.iter().any(|known| known.eq_ignore_ascii_case(region)) {
                return Err(ParleyError::Configuration(format!(
                    "unknown region '{region}', expected one of {KNOWN_REGIONS:?}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_kind_from_url() {
        assert_eq!(
            BackendKind::detect("https://api.dify.ai/v1/chat-messages"),
            BackendKind::JsonChat
        );
        assert_eq!(
            BackendKind::detect("https://internal.example/v1/chat-messages"),
            BackendKind::JsonChat
        );
        assert_eq!(
            BackendKind::detect("https://api.coze.cn/v3/chat"),
            BackendKind::StreamingEvents
        );
        assert_eq!(
            BackendKind::detect("https://bots.example.com/ask"),
            BackendKind::GenericRest
        );
    }

    #[test]
    fn header_lookup_ignores_case() {
        let config = BackendConfig::new(BackendKind::GenericRest, "https://x.test")
            .with_header("AUTHORIZATION", "Bearer abc");
        assert_eq!(config.header("authorization"), Some("Bearer abc"));
        assert_eq!(config.bearer_token(), Some("abc"));
    }

    #[test]
    fn bearer_token_without_prefix_is_returned_verbatim() {
        let config = BackendConfig::new(BackendKind::GenericRest, "https://x.test")
            .with_header("authorization", "raw-token");
        assert_eq!(config.bearer_token(), Some("raw-token"));
    }

    #[test]
    fn validate_rejects_bad_endpoints() {
        let config = BackendConfig::new(BackendKind::GenericRest, "not a url");
        assert!(matches!(config.validate(), Err(ParleyError::Configuration(_))));

        let config = BackendConfig::new(BackendKind::GenericRest, "ftp://x.test/");
        assert!(matches!(config.validate(), Err(ParleyError::Configuration(_))));
    }

    #[test]
    fn streaming_backends_need_a_bot() {
        let config = BackendConfig::new(BackendKind::StreamingEvents, "https://api.coze.cn/v3/chat");
        assert!(config.validate().is_err());
        assert!(config.clone().with_bot_id("742").validate().is_ok());
        assert!(config.with_agent_id("agent-9").validate().is_ok());
    }

    #[test]
    fn bot_id_wins_over_agent_id() {
        let config = BackendConfig::new(BackendKind::StreamingEvents, "https://api.coze.cn/v3/chat")
            .with_agent_id("agent-9");
        assert_eq!(config.target_id(), Some("agent-9"));
        assert_eq!(config.with_bot_id("742").target_id(), Some("742"));
    }

    #[test]
    fn regions_pick_the_host() {
        assert_eq!(regional_endpoint(Some("China")), "https://api.coze.cn/v3/chat");
        assert_eq!(regional_endpoint(Some("global")), "https://api.coze.com/v3/chat");
        assert_eq!(regional_endpoint(None), "https://api.coze.com/v3/chat");

        let config = BackendConfig::new(BackendKind::StreamingEvents, regional_endpoint(None))
            .with_bot_id("742");
        assert!(config.clone().with_region("global").validate().is_ok());
        assert!(matches!(
            config.with_region("mars").validate(),
            Err(ParleyError::Configuration(_))
        ));
    }

    #[test]
    fn kind_round_trips_through_strings() {
        assert_eq!(BackendKind::JsonChat.to_string(), "json_chat");
        assert_eq!("generic_rest".parse::<BackendKind>().unwrap(), BackendKind::GenericRest);
    }
}
