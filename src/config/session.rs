//! Session and generation-service settings.

use std::time::Duration;

use bon::Builder;

use crate::extract::ExtractionConfig;
use crate::util::retry::RetryPolicy;

/// Default number of turns per session.
pub const DEFAULT_MAX_TURNS: u32 = 3;
/// Upper bound accepted for `max_turns`.
pub const MAX_TURNS_LIMIT: u32 = 20;

pub const DEFAULT_GENERATION_URL: &str = "https://api.deepseek.com/chat/completions";
pub const DEFAULT_GENERATION_MODEL: &str = "deepseek-chat";

/// Knobs for one dialogue session.
///
/// `retry.max_attempts` doubles as the consecutive-failure cap of a turn.
#[derive(Debug, Clone, Builder)]
pub struct SessionSettings {
    #[builder(default = DEFAULT_MAX_TURNS)]
    pub max_turns: u32,
    #[builder(default)]
    pub retry: RetryPolicy,
    /// Overall wall-clock budget for the session.
    pub session_deadline: Option<Duration>,
    #[builder(default)]
    pub extraction: ExtractionConfig,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SessionSettings {
    /// Consecutive failed attempts tolerated before a session gives up.
    pub fn failure_cap(&self) -> u32 {
        self.retry.max_attempts.max(1)
    }
}

/// Connection settings for the generation service that plays the user.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub api_key: Option<String>,
    pub url: String,
    pub model: String,
    pub timeout: Duration,
    /// Temperature for opening messages.
    pub opening_temperature: f64,
    /// Temperature for follow-up messages.
    pub follow_up_temperature: f64,
    pub max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            url: DEFAULT_GENERATION_URL.to_string(),
            model: DEFAULT_GENERATION_MODEL.to_string(),
            timeout: Duration::from_secs(60),
            opening_temperature: 0.6,
            follow_up_temperature: 0.7,
            max_tokens: 150,
        }
    }
}
