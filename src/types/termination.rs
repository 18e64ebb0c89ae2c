//! Why a dialogue stops.

use serde::{Deserialize, Serialize};

use crate::error::ErrorCategory;

/// Why the turn generator wants (or does not want) to stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerdictReason {
    /// Keep talking.
    Continue,
    /// The generated text was an explicit end token.
    EndToken { token: String },
    /// The generated text signalled the user is satisfied.
    Satisfied { phrase: String },
    /// Output was too short or repeated the conversation.
    UnusableOutput,
    /// The generation service failed or timed out.
    GenerationFailed { category: ErrorCategory },
}

/// Per-turn decision produced by the turn generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationVerdict {
    pub should_end: bool,
    pub reason: VerdictReason,
}

impl TerminationVerdict {
    pub fn proceed() -> Self {
        Self {
            should_end: false,
            reason: VerdictReason::Continue,
        }
    }

    pub fn end(reason: VerdictReason) -> Self {
        Self {
            should_end: true,
            reason,
        }
    }
}

/// Final state of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminationReason {
    /// Reached `max_turns`. Not an error.
    Exhausted,
    /// The generator decided the conversation is over.
    ConversationEnded { reason: VerdictReason },
    /// The generation service could not produce the next message.
    GenerationFailed { category: ErrorCategory },
    /// Consecutive failed attempts hit the cap.
    RepeatedFailures { category: ErrorCategory },
    /// The backend rejected the credentials (401/403).
    AuthRejected,
    /// The backend answered with a non-retryable error.
    BackendRejected { category: ErrorCategory, status: Option<u16> },
    /// The caller cancelled the session.
    Cancelled,
    /// The overall session deadline passed.
    DeadlineExceeded,
}

impl TerminationReason {
    /// Reasons caused by something going wrong rather than a natural end.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Exhausted | Self::ConversationEnded { .. })
    }

    /// Cancellation and deadline both end the session on time grounds.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_ends_are_not_failures() {
        assert!(!TerminationReason::Exhausted.is_failure());
        assert!(!TerminationReason::ConversationEnded {
            reason: VerdictReason::EndToken { token: "END".into() }
        }
        .is_failure());
        assert!(TerminationReason::AuthRejected.is_failure());
        assert!(TerminationReason::DeadlineExceeded.is_timeout());
    }

    #[test]
    fn reasons_serialize_with_tags() {
        let json = serde_json::to_value(TerminationReason::RepeatedFailures {
            category: ErrorCategory::Timeout,
        })
        .unwrap();
        assert_eq!(json["kind"], "repeated_failures");
        assert_eq!(json["category"], "timeout");
    }
}
