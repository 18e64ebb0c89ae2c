//! OpenAI-compatible chat-completions client used to play the user.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{GenerationService, Prompt};
use crate::adapter::http::{shared_client, status_to_error};
use crate::config::GenerationConfig;
use crate::error::{ParleyError, Result};
use crate::util::retry::RetryPolicy;
use crate::util::timeout::with_timeout;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// [`GenerationService`] backed by a `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct ChatCompletionsService {
    config: GenerationConfig,
    api_key: String,
    retry: RetryPolicy,
}

impl ChatCompletionsService {
    /// Fails when no API key is configured.
    pub fn new(config: GenerationConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ParleyError::Authentication(
                    "Missing generation API key (PARLEY_GENERATION_API_KEY or DEEPSEEK_API_KEY)"
                        .into(),
                )
            })?;
        Ok(Self {
            config,
            api_key,
            retry: RetryPolicy::no_retry(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    fn build_request_body(&self, prompt: &Prompt) -> serde_json::Value {
        json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt.text}],
            "temperature": prompt.temperature.unwrap_or(self.config.follow_up_temperature),
            "max_tokens": prompt.max_tokens.unwrap_or(self.config.max_tokens),
        })
    }

    async fn call(&self, prompt: &Prompt) -> Result<String> {
        let body = self.build_request_body(prompt);
        debug!(model = %self.config.model, "chat completion");

        with_timeout(self.config.timeout, async {
            let resp = shared_client()
                .post(&self.config.url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await?;

            let status = resp.status().as_u16();
            if status != 200 {
                let body_text = resp.text().await.unwrap_or_default();
                return Err(status_to_error(status, &body_text));
            }

            let body_text = resp.text().await?;
            let data: ChatResponse = serde_json::from_str(&body_text).map_err(|e| {
                ParleyError::MalformedResponse(format!("completion body: {e}"))
            })?;
            data.choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .map(|content| content.trim().to_string())
                .ok_or_else(|| ParleyError::Generation("no choices in completion response".into()))
        })
        .await
    }
}

#[async_trait]
impl GenerationService for ChatCompletionsService {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        self.retry.execute(|| self.call(prompt)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_an_api_key() {
        let err = ChatCompletionsService::new(GenerationConfig::default()).unwrap_err();
        assert!(err.is_auth());

        let config = GenerationConfig {
            api_key: Some("  ".into()),
            ..GenerationConfig::default()
        };
        assert!(ChatCompletionsService::new(config).is_err());
    }

    #[test]
    fn prompt_overrides_defaults() {
        let config = GenerationConfig {
            api_key: Some("sk-test".into()),
            ..GenerationConfig::default()
        };
        let service = ChatCompletionsService::new(config).unwrap();
        let body = service.build_request_body(&Prompt::new("hi").with_temperature(0.6));
        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["temperature"], 0.6);
        assert_eq!(body["max_tokens"], 150);
        assert_eq!(body["messages"][0]["content"], "hi");
    }
}
