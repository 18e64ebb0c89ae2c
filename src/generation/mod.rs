//! Synthetic-user message generation.
//!
//! A [`GenerationService`] is the external language model that plays the
//! user; [`TurnGenerator`] turns scenario, persona and history into prompts,
//! cleans what comes back and decides whether the dialogue should end.

pub mod prompt;
pub mod service;
pub mod stop;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::GenerationConfig;
use crate::error::Result;
use crate::types::{Persona, Scenario, TerminationVerdict, Turn, VerdictReason};
use crate::util::timeout::with_timeout;

pub use service::ChatCompletionsService;
pub use stop::{clean_generated, EndCondition, EndTokenStop, PhraseStop, PredicateStop};

/// Generated messages shorter than this (in characters) are unusable.
pub const MIN_MESSAGE_CHARS: usize = 3;

/// One request to the generation service.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub text: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

impl Prompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// The language model that speaks for the synthetic user.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, prompt: &Prompt) -> Result<String>;
}

/// A candidate next message and whether the dialogue should stop.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedMessage {
    pub text: String,
    pub verdict: TerminationVerdict,
}

impl GeneratedMessage {
    fn ended(reason: VerdictReason) -> Self {
        Self {
            text: String::new(),
            verdict: TerminationVerdict::end(reason),
        }
    }
}

/// Produces opening and follow-up messages for a session.
pub struct TurnGenerator {
    service: Arc<dyn GenerationService>,
    timeout: Duration,
    opening_temperature: f64,
    follow_up_temperature: f64,
    max_tokens: u32,
    conditions: Vec<Box<dyn EndCondition>>,
}

impl TurnGenerator {
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        let defaults = GenerationConfig::default();
        Self {
            service,
            timeout: defaults.timeout,
            opening_temperature: defaults.opening_temperature,
            follow_up_temperature: defaults.follow_up_temperature,
            max_tokens: defaults.max_tokens,
            conditions: vec![
                Box::new(EndTokenStop::default()),
                Box::new(PhraseStop::default()),
            ],
        }
    }

    /// Take temperatures, token limit and timeout from a generation config.
    pub fn with_config(mut self, config: &GenerationConfig) -> Self {
        self.timeout = config.timeout;
        self.opening_temperature = config.opening_temperature;
        self.follow_up_temperature = config.follow_up_temperature;
        self.max_tokens = config.max_tokens;
        self
    }

    /// Bound every generation call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add an end condition on top of the default end tokens and phrases.
    pub fn with_condition(mut self, condition: Box<dyn EndCondition>) -> Self {
        self.conditions.push(condition);
        self
    }

    async fn generate(&self, prompt: Prompt) -> Result<String> {
        with_timeout(self.timeout, self.service.generate(&prompt)).await
    }

    /// First message of a session.
    ///
    /// Falls back to the persona's first opening line when generation fails.
    pub async fn opening(&self, scenario: &Scenario, persona: &Persona) -> GeneratedMessage {
        let prompt = Prompt::new(prompt::opening_prompt(scenario, persona))
            .with_temperature(self.opening_temperature)
            .with_max_tokens(self.max_tokens);

        let message = match self.generate(prompt).await {
            Ok(text) => self.assess(&text, "", ""),
            Err(e) => {
                warn!(error = %e, "opening generation failed");
                GeneratedMessage::ended(VerdictReason::GenerationFailed {
                    category: e.category(),
                })
            }
        };

        if message.verdict.should_end {
            if let Some(line) = persona.opening_lines.first() {
                debug!("using persona opening line");
                return GeneratedMessage {
                    text: line.clone(),
                    verdict: TerminationVerdict::proceed(),
                };
            }
        }
        message
    }

    /// Next message given the history so far and the backend's last answer.
    pub async fn follow_up(
        &self,
        scenario: &Scenario,
        persona: &Persona,
        history: &[Turn],
        last_reply: &str,
    ) -> GeneratedMessage {
        let prompt = Prompt::new(prompt::follow_up_prompt(scenario, persona, history, last_reply))
            .with_temperature(self.follow_up_temperature)
            .with_max_tokens(self.max_tokens);

        match self.generate(prompt).await {
            Ok(text) => {
                let last_outgoing = history
                    .last()
                    .map(|turn| turn.outgoing_message.as_str())
                    .unwrap_or_default();
                self.assess(&text, last_reply, last_outgoing)
            }
            Err(e) => {
                warn!(error = %e, turn = history.len() + 1, "follow-up generation failed");
                GeneratedMessage::ended(VerdictReason::GenerationFailed {
                    category: e.category(),
                })
            }
        }
    }

    /// Clean raw generated text and decide whether it ends the dialogue.
    pub fn assess(&self, raw: &str, last_reply: &str, last_outgoing: &str) -> GeneratedMessage {
        let text = clean_generated(raw);

        if let Some(reason) = self.conditions.iter().find_map(|c| c.check(&text)) {
            debug!(?reason, "generated message ends the conversation");
            return GeneratedMessage {
                text,
                verdict: TerminationVerdict::end(reason),
            };
        }

        if text.chars().count() < MIN_MESSAGE_CHARS
            || is_echo(&text, last_reply)
            || is_echo(&text, last_outgoing)
        {
            debug!(chars = text.chars().count(), "generated message is unusable");
            return GeneratedMessage {
                text,
                verdict: TerminationVerdict::end(VerdictReason::UnusableOutput),
            };
        }

        GeneratedMessage {
            text,
            verdict: TerminationVerdict::proceed(),
        }
    }
}

fn is_echo(text: &str, previous: &str) -> bool {
    let previous = clean_generated(previous);
    !previous.is_empty() && text.to_lowercase() == previous.to_lowercase()
}
