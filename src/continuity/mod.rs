//! Conversation continuity across turns.
//!
//! Backends that track conversations hand back an identifier that must be
//! echoed on the next call. Backends that don't get a locally minted id
//! instead, so every session still has a stable handle.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::config::BackendKind;

/// How the continuity token is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContinuityMode {
    /// Assigned by the backend; adopted from replies.
    Native,
    /// Generated once at session start; replies are ignored.
    Local,
}

/// Tracks the token that threads one session's turns together.
#[derive(Debug, Clone)]
pub struct ConversationContinuity {
    mode: ContinuityMode,
    token: String,
}

impl ConversationContinuity {
    pub fn for_kind(kind: BackendKind) -> Self {
        let mode = if kind.has_native_continuity() {
            ContinuityMode::Native
        } else {
            ContinuityMode::Local
        };
        Self {
            mode,
            token: String::new(),
        }
    }

    pub fn mode(&self) -> ContinuityMode {
        self.mode
    }

    /// Begin a session and return the initial token.
    ///
    /// Native mode starts empty so the backend opens a new conversation.
    /// Calling `start` again keeps an existing token.
    pub fn start(&mut self) -> String {
        if self.mode == ContinuityMode::Local && self.token.is_empty() {
            self.token = local_conversation_id();
        }
        self.token.clone()
    }

    /// Adopt a token reported by the backend. Empty tokens are ignored, so
    /// a known token is never reset.
    pub fn update(&mut self, token: &str) {
        if self.mode == ContinuityMode::Local || token.is_empty() || token == self.token {
            return;
        }
        tracing::debug!(
            previous = %self.token,
            current = %token,
            "conversation token updated"
        );
        self.token = token.to_string();
    }

    pub fn current(&self) -> &str {
        &self.token
    }
}

/// `conv_<YYYYmmdd_HHMMSS>_<8 hex>`
fn local_conversation_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("conv_{}_{}", Utc::now().format("%Y%m%d_%H%M%S"), &suffix[..8])
}

/// Per-session conversation bookkeeping, owned by one orchestrator.
#[derive(Debug, Clone)]
pub struct ConversationState {
    pub session_id: Uuid,
    pub backend_kind: BackendKind,
    pub continuity: ConversationContinuity,
}

impl ConversationState {
    pub fn new(backend_kind: BackendKind) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            backend_kind,
            continuity: ConversationContinuity::for_kind(backend_kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_adopts_non_empty_tokens() {
        let mut continuity = ConversationContinuity::for_kind(BackendKind::JsonChat);
        assert_eq!(continuity.start(), "");
        continuity.update("abc");
        assert_eq!(continuity.current(), "abc");
        continuity.update("");
        assert_eq!(continuity.current(), "abc");
        continuity.update("def");
        assert_eq!(continuity.current(), "def");
    }

    #[test]
    fn local_generates_once_and_ignores_updates() {
        let mut continuity = ConversationContinuity::for_kind(BackendKind::GenericRest);
        assert_eq!(continuity.mode(), ContinuityMode::Local);
        let token = continuity.start();
        assert!(token.starts_with("conv_"));
        // conv_ + 8 date digits + _ + 6 time digits + _ + 8 hex
        assert_eq!(token.len(), 5 + 8 + 1 + 6 + 1 + 8);
        continuity.update("server-side");
        assert_eq!(continuity.current(), token);
        assert_eq!(continuity.start(), token);
    }

    #[test]
    fn update_with_empty_string_is_a_no_op_before_start() {
        let mut continuity = ConversationContinuity::for_kind(BackendKind::StreamingEvents);
        continuity.update("");
        assert_eq!(continuity.current(), "");
    }
}
