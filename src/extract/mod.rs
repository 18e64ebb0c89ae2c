//! Answer extraction from heterogeneous reply payloads.
//!
//! Backends wrap the user-visible answer in very different envelopes: tool
//! invocation results, flat JSON fields, labelled sections, streamed deltas
//! or plain text. [`ContentExtractor`] runs an ordered set of strategies over
//! a normalized view of the reply and picks one answer:
//!
//! 1. the first strategy (in [`ExtractionMethod`] order) with a
//!    non-bookkeeping candidate longer than `min_answer_chars`;
//! 2. otherwise the first strategy with any non-bookkeeping candidate;
//! 3. otherwise a bookkeeping candidate, only if explicitly allowed.
//!
//! Within a strategy the longest candidate wins. A payload that is nothing
//! but agent bookkeeping yields no answer at all.

mod markers;
mod payload;
mod strategy;

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::types::{
    Extraction, ExtractionCandidate, ExtractionMethod, RawResult, ReplyPayload, StreamEvent,
};

use payload::Payload;
use strategy::PIPELINE;

/// Default minimum length for a first-pass answer.
pub const DEFAULT_MIN_ANSWER_CHARS: usize = 20;
/// Payloads at least this long are never treated as pure bookkeeping.
pub const DEFAULT_BOOKKEEPING_THRESHOLD: usize = 2_000;
/// Longest text passthrough will return verbatim.
pub const DEFAULT_PASSTHROUGH_MAX_CHARS: usize = 20_000;
/// How deep JSON embedded in tool outputs is followed.
pub const DEFAULT_MAX_DEPTH: u8 = 2;

/// Tunables for [`ContentExtractor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractionConfig {
    pub min_answer_chars: usize,
    pub bookkeeping_length_threshold: usize,
    pub passthrough_max_chars: usize,
    pub max_depth: u8,
    /// Accept a bookkeeping candidate when nothing else is available.
    pub allow_bookkeeping_fallback: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_answer_chars: DEFAULT_MIN_ANSWER_CHARS,
            bookkeeping_length_threshold: DEFAULT_BOOKKEEPING_THRESHOLD,
            passthrough_max_chars: DEFAULT_PASSTHROUGH_MAX_CHARS,
            max_depth: DEFAULT_MAX_DEPTH,
            allow_bookkeeping_fallback: false,
        }
    }
}

/// Pulls the user-visible answer out of a backend reply.
///
/// Stateless apart from its configuration; one extractor can serve any
/// number of sessions.
#[derive(Debug, Clone, Default)]
pub struct ContentExtractor {
    config: ExtractionConfig,
}

impl ContentExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract the answer from an adapter result. `None` means no usable
    /// answer, including replies that are only bookkeeping.
    pub fn extract(&self, raw: &RawResult) -> Option<Extraction> {
        match &raw.payload {
            ReplyPayload::Json(value) => self.select(&Payload::from_json(value), 0),
            ReplyPayload::EventStream => self.select(&Payload::from_stream(&raw.body), 0),
            ReplyPayload::Text(text) => self.extract_text(text),
            ReplyPayload::Empty => None,
        }
    }

    /// Extract from free-form text, detecting JSON and event streams.
    pub fn extract_text(&self, text: &str) -> Option<Extraction> {
        self.select(&Payload::from_text(text), 0)
    }

    /// Extract from already-decoded stream events.
    pub fn extract_events<I>(&self, events: I) -> Option<Extraction>
    where
        I: IntoIterator<Item = StreamEvent>,
    {
        let events: Vec<StreamEvent> = events.into_iter().collect();
        let raw = events
            .iter()
            .map(|event| event.raw_payload.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.select(&Payload::from_events(Cow::Owned(raw), events), 0)
    }

    /// Candidates a single strategy proposes for `text`, before selection.
    pub fn candidates(&self, method: ExtractionMethod, text: &str) -> Vec<ExtractionCandidate> {
        strategy::run(method, self, &Payload::from_text(text), 0)
    }

    pub(crate) fn extract_nested(&self, text: &str, depth: u8) -> Option<Extraction> {
        self.select(&Payload::from_text(text), depth)
    }

    fn select(&self, payload: &Payload<'_>, depth: u8) -> Option<Extraction> {
        if payload.is_pure_bookkeeping(self.config.bookkeeping_length_threshold) {
            tracing::debug!(
                chars = payload.raw_chars(),
                depth,
                "reply is agent bookkeeping only"
            );
            return None;
        }

        let mut proposed: Vec<Vec<ExtractionCandidate>> = Vec::with_capacity(PIPELINE.len());
        for method in PIPELINE {
            let candidates = strategy::run(method, self, payload, depth);
            let best = longest(candidates.iter().filter(|candidate| {
                !candidate.is_system_bookkeeping
                    && candidate.length > self.config.min_answer_chars
            }));
            if let Some(best) = best {
                return Some(finish(best, depth));
            }
            proposed.push(candidates);
        }

        let fallback = proposed
            .iter()
            .find_map(|candidates| {
                longest(candidates.iter().filter(|c| !c.is_system_bookkeeping))
            })
            .or_else(|| {
                if !self.config.allow_bookkeeping_fallback {
                    return None;
                }
                proposed
                    .iter()
                    .find_map(|candidates| longest(candidates.iter()))
            });

        match fallback {
            Some(best) => Some(finish(best, depth)),
            None => {
                tracing::debug!(depth, "no extraction strategy produced an answer");
                None
            }
        }
    }
}

/// Longest candidate, the earliest one on ties.
fn longest<'c>(
    candidates: impl Iterator<Item = &'c ExtractionCandidate>,
) -> Option<&'c ExtractionCandidate> {
    candidates.fold(None, |best, candidate| match best {
        Some(current) if current.length >= candidate.length => Some(current),
        _ => Some(candidate),
    })
}

fn finish(candidate: &ExtractionCandidate, depth: u8) -> Extraction {
    tracing::trace!(
        method = %candidate.source,
        chars = candidate.length,
        depth,
        "selected answer"
    );
    Extraction {
        answer: candidate.text.clone(),
        method: candidate.source,
    }
}
