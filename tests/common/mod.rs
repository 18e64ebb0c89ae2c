//! Shared test helpers: scripted adapter and generation service.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use parley::adapter::{SendOutcome, WireAdapter};
use parley::config::BackendKind;
use parley::error::{ParleyError, Result};
use parley::generation::{GenerationService, Prompt, TurnGenerator};
use parley::types::RawResult;

/// One recorded `send` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub message: String,
    pub continuity_token: String,
}

/// An adapter that replays canned outcomes.
///
/// Once the script runs out it answers every message with a fixed reply.
pub struct ScriptedAdapter {
    kind: BackendKind,
    replies: Mutex<VecDeque<Result<SendOutcome>>>,
    sent: Arc<Mutex<Vec<Sent>>>,
}

impl ScriptedAdapter {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            replies: Mutex::new(VecDeque::new()),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a plain-text answer.
    pub fn answer(self, text: &str) -> Self {
        self.outcome(Ok(SendOutcome {
            raw: RawResult::text(text),
            continuity_token: None,
        }))
    }

    /// Queue an answer that also reports a conversation id.
    pub fn answer_in(self, text: &str, conversation_id: &str) -> Self {
        self.outcome(Ok(SendOutcome {
            raw: RawResult::text(text),
            continuity_token: Some(conversation_id.to_string()),
        }))
    }

    /// Queue a failure.
    pub fn fail(self, error: ParleyError) -> Self {
        self.outcome(Err(error))
    }

    pub fn outcome(self, outcome: Result<SendOutcome>) -> Self {
        self.replies.lock().unwrap().push_back(outcome);
        self
    }

    /// Handle on the calls made so far; stays valid after the adapter is boxed.
    pub fn log(&self) -> Arc<Mutex<Vec<Sent>>> {
        Arc::clone(&self.sent)
    }
}

#[async_trait]
impl WireAdapter for ScriptedAdapter {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn send(&self, message: &str, continuity_token: &str) -> Result<SendOutcome> {
        self.sent.lock().unwrap().push(Sent {
            message: message.to_string(),
            continuity_token: continuity_token.to_string(),
        });
        self.replies.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(SendOutcome {
                raw: RawResult::text("Here is a detailed answer to your question."),
                continuity_token: None,
            })
        })
    }
}

/// A generation service that replays canned replies, then invents distinct
/// follow-up questions.
pub struct ScriptedService {
    replies: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<Prompt>>,
    calls: AtomicUsize,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn reply(self, text: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(self, error: ParleyError) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationService for ScriptedService {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.prompts.lock().unwrap().push(prompt.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("Could you explain point number {call} in more detail?")))
    }
}

pub fn generator(service: Arc<ScriptedService>) -> TurnGenerator {
    TurnGenerator::new(service)
}
