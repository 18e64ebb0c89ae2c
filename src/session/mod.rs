//! Bounded dialogue sessions against one backend.
//!
//! A session is a small state machine:
//!
//! ```text
//! Init → AwaitingInitialMessage → TurnInFlight → TurnRecorded → TurnInFlight …
//!                                      ↓   ↑
//!                                   TurnFailed
//! ```
//!
//! Every await on the network, the generation service or a back-off is
//! raced against the caller's [`CancellationToken`] and the optional session
//! deadline, so a session always ends with the turns recorded so far.

mod transcript;

pub use transcript::SessionTranscript;

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use strum::Display;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapter::{create_adapter, WireAdapter};
use crate::config::{BackendConfig, SessionSettings, MAX_TURNS_LIMIT};
use crate::continuity::ConversationState;
use crate::error::{ErrorCategory, ParleyError, Result};
use crate::extract::ContentExtractor;
use crate::generation::{GeneratedMessage, TurnGenerator};
use crate::types::{Persona, Scenario, TerminationReason, Turn, VerdictReason};

/// Where a session is in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    Init,
    AwaitingInitialMessage,
    TurnInFlight,
    TurnRecorded,
    TurnFailed,
    Terminated,
}

/// One scenario to play in [`run_sessions`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPlan {
    pub scenario: Scenario,
    pub persona: Persona,
}

impl SessionPlan {
    pub fn new(scenario: Scenario, persona: Persona) -> Self {
        Self { scenario, persona }
    }
}

/// Drives one session: sends messages, extracts answers, asks the
/// generator for the next message, and stops on a verdict, the turn limit,
/// repeated failures, cancellation or the deadline.
pub struct SessionOrchestrator<'g> {
    adapter: Box<dyn WireAdapter>,
    generator: &'g TurnGenerator,
    extractor: ContentExtractor,
    settings: SessionSettings,
    cancel: CancellationToken,
}

impl<'g> SessionOrchestrator<'g> {
    pub fn new(
        adapter: Box<dyn WireAdapter>,
        generator: &'g TurnGenerator,
        settings: SessionSettings,
    ) -> Result<Self> {
        validate_max_turns(settings.max_turns)?;
        Ok(Self {
            adapter,
            generator,
            extractor: ContentExtractor::new(settings.extraction.clone()),
            settings,
            cancel: CancellationToken::new(),
        })
    }

    /// Stop the session when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the session to completion.
    pub async fn run(self, scenario: &Scenario, persona: &Persona) -> SessionTranscript {
        let started_at = Utc::now();
        let deadline = self
            .settings
            .session_deadline
            .map(|budget| Instant::now() + budget);
        let mut conversation = ConversationState::new(self.adapter.kind());
        let mut turns = Vec::new();

        info!(
            session_id = %conversation.session_id,
            backend = %conversation.backend_kind,
            scenario = %scenario.title,
            max_turns = self.settings.max_turns,
            "session started"
        );

        let reason = self
            .drive(scenario, persona, &mut conversation, &mut turns, deadline)
            .await;

        info!(
            session_id = %conversation.session_id,
            state = %SessionState::Terminated,
            turns = turns.len(),
            reason = ?reason,
            "session finished"
        );

        SessionTranscript {
            session_id: conversation.session_id,
            backend_kind: conversation.backend_kind,
            scenario_title: scenario.title.clone(),
            turns,
            reason,
            conversation_id: conversation.continuity.current().to_string(),
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn drive(
        &self,
        scenario: &Scenario,
        persona: &Persona,
        conversation: &mut ConversationState,
        turns: &mut Vec<Turn>,
        deadline: Option<Instant>,
    ) -> TerminationReason {
        let session_id = conversation.session_id;
        let failure_cap = self.settings.failure_cap();
        let mut state = SessionState::Init;
        let mut message = String::new();
        let mut last_answer = String::new();
        let mut attempts = 0u32;
        let mut failures = 0u32;
        let mut failure_category = ErrorCategory::Malformed;

        loop {
            debug!(%session_id, %state, turn = turns.len() + 1, "session step");
            state = match state {
                SessionState::Init => {
                    conversation.continuity.start();
                    SessionState::AwaitingInitialMessage
                }

                SessionState::AwaitingInitialMessage => {
                    let opening = match self
                        .guard(self.generator.opening(scenario, persona), deadline)
                        .await
                    {
                        Ok(opening) => opening,
                        Err(reason) => return reason,
                    };
                    if opening.verdict.should_end {
                        return ended_by(opening);
                    }
                    message = opening.text;
                    SessionState::TurnInFlight
                }

                SessionState::TurnInFlight => {
                    attempts += 1;
                    let token = conversation.continuity.current().to_string();
                    let sent = match self
                        .guard(self.adapter.send(&message, &token), deadline)
                        .await
                    {
                        Ok(sent) => sent,
                        Err(reason) => return reason,
                    };

                    match sent {
                        Ok(outcome) => {
                            if let Some(token) = outcome.continuity_token.as_deref() {
                                conversation.continuity.update(token);
                            }
                            match self.extractor.extract(&outcome.raw) {
                                Some(extraction) => {
                                    turns.push(Turn {
                                        index: turns.len() as u32 + 1,
                                        outgoing_message: message.clone(),
                                        raw_response: outcome.raw.body,
                                        extracted_answer: extraction.answer.clone(),
                                        extraction_method: extraction.method,
                                        continuity_token: conversation
                                            .continuity
                                            .current()
                                            .to_string(),
                                        attempts,
                                        timestamp: Utc::now(),
                                    });
                                    last_answer = extraction.answer;
                                    SessionState::TurnRecorded
                                }
                                None => {
                                    warn!(
                                        %session_id,
                                        turn = turns.len() + 1,
                                        attempt = attempts,
                                        "no answer could be extracted from the reply"
                                    );
                                    failure_category = ErrorCategory::Malformed;
                                    SessionState::TurnFailed
                                }
                            }
                        }
                        Err(e) if e.is_auth() => {
                            warn!(%session_id, error = %e, "backend rejected credentials");
                            return TerminationReason::AuthRejected;
                        }
                        Err(e) if !e.is_retryable() => {
                            warn!(%session_id, error = %e, "backend rejected the request");
                            return TerminationReason::BackendRejected {
                                category: e.category(),
                                status: e.status(),
                            };
                        }
                        Err(e) => {
                            warn!(
                                %session_id,
                                turn = turns.len() + 1,
                                attempt = attempts,
                                error = %e,
                                "send failed"
                            );
                            failure_category = e.category();
                            SessionState::TurnFailed
                        }
                    }
                }

                SessionState::TurnFailed => {
                    failures += 1;
                    if failures >= failure_cap {
                        return TerminationReason::RepeatedFailures {
                            category: failure_category,
                        };
                    }
                    let backoff = self.settings.retry.jittered_backoff_for(failures);
                    debug!(%session_id, backoff_ms = backoff.as_millis() as u64, "backing off");
                    if let Err(reason) = self.guard(tokio::time::sleep(backoff), deadline).await {
                        return reason;
                    }
                    SessionState::TurnInFlight
                }

                SessionState::TurnRecorded => {
                    failures = 0;
                    attempts = 0;
                    if turns.len() as u32 >= self.settings.max_turns {
                        return TerminationReason::Exhausted;
                    }
                    let next = match self
                        .guard(
                            self.generator
                                .follow_up(scenario, persona, turns, &last_answer),
                            deadline,
                        )
                        .await
                    {
                        Ok(next) => next,
                        Err(reason) => return reason,
                    };
                    if next.verdict.should_end {
                        return ended_by(next);
                    }
                    message = next.text;
                    SessionState::TurnInFlight
                }

                // terminal states return from the arm that reaches them
                SessionState::Terminated => return TerminationReason::Exhausted,
            };
        }
    }

    /// Race `future` against cancellation and the session deadline.
    async fn guard<F: Future>(
        &self,
        future: F,
        deadline: Option<Instant>,
    ) -> std::result::Result<F::Output, TerminationReason> {
        let expired = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TerminationReason::Cancelled),
            _ = expired => Err(TerminationReason::DeadlineExceeded),
            output = future => Ok(output),
        }
    }
}

fn ended_by(message: GeneratedMessage) -> TerminationReason {
    match message.verdict.reason {
        VerdictReason::GenerationFailed { category } => {
            TerminationReason::GenerationFailed { category }
        }
        reason => TerminationReason::ConversationEnded { reason },
    }
}

fn validate_max_turns(max_turns: u32) -> Result<()> {
    if max_turns == 0 || max_turns > MAX_TURNS_LIMIT {
        return Err(ParleyError::InvalidArgument(format!(
            "max_turns must be between 1 and {MAX_TURNS_LIMIT}, got {max_turns}"
        )));
    }
    Ok(())
}

/// Run one session with default settings and `max_turns` turns.
///
/// Errors only for invalid configuration; every runtime failure is reported
/// through [`SessionTranscript::reason`].
pub async fn run_session(
    config: Arc<BackendConfig>,
    generator: &TurnGenerator,
    scenario: &Scenario,
    persona: &Persona,
    max_turns: u32,
) -> Result<SessionTranscript> {
    let settings = SessionSettings::builder().max_turns(max_turns).build();
    run_session_with(config, generator, scenario, persona, settings, CancellationToken::new()).await
}

/// Run one session with explicit settings and cancellation.
pub async fn run_session_with(
    config: Arc<BackendConfig>,
    generator: &TurnGenerator,
    scenario: &Scenario,
    persona: &Persona,
    settings: SessionSettings,
    cancel: CancellationToken,
) -> Result<SessionTranscript> {
    validate_max_turns(settings.max_turns)?;
    let adapter = create_adapter(config)?;
    let orchestrator = SessionOrchestrator::new(adapter, generator, settings)?.with_cancellation(cancel);
    Ok(orchestrator.run(scenario, persona).await)
}

/// Run several sessions concurrently, at most `concurrency` at a time.
///
/// Results come back in plan order. Each session gets its own adapter and
/// conversation state; cancelling `cancel` stops all of them.
pub async fn run_sessions(
    config: Arc<BackendConfig>,
    generator: &TurnGenerator,
    plans: Vec<SessionPlan>,
    settings: SessionSettings,
    concurrency: usize,
    cancel: CancellationToken,
) -> Vec<Result<SessionTranscript>> {
    stream::iter(plans)
        .map(|plan| {
            let config = Arc::clone(&config);
            let settings = settings.clone();
            let cancel = cancel.child_token();
            async move {
                run_session_with(
                    config,
                    generator,
                    &plan.scenario,
                    &plan.persona,
                    settings,
                    cancel,
                )
                .await
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_turns_bounds() {
        assert!(validate_max_turns(0).is_err());
        assert!(validate_max_turns(1).is_ok());
        assert!(validate_max_turns(MAX_TURNS_LIMIT).is_ok());
        assert!(validate_max_turns(MAX_TURNS_LIMIT + 1).is_err());
    }

    #[test]
    fn generation_failures_keep_their_category() {
        let message = GeneratedMessage {
            text: String::new(),
            verdict: crate::types::TerminationVerdict::end(VerdictReason::GenerationFailed {
                category: ErrorCategory::Network,
            }),
        };
        assert_eq!(
            ended_by(message),
            TerminationReason::GenerationFailed {
                category: ErrorCategory::Network
            }
        );
    }

    #[test]
    fn states_render_in_snake_case() {
        assert_eq!(SessionState::TurnInFlight.to_string(), "turn_in_flight");
    }
}
