//! Session results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::BackendKind;
use crate::error::{ParleyError, Result};
use crate::types::{TerminationReason, Turn};

/// Everything one session produced, including why it stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTranscript {
    pub session_id: Uuid,
    pub backend_kind: BackendKind,
    pub scenario_title: String,
    pub turns: Vec<Turn>,
    pub reason: TerminationReason,
    /// Continuity token in effect when the session ended.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub conversation_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SessionTranscript {
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Total send attempts across all recorded turns.
    pub fn attempts(&self) -> u32 {
        self.turns.iter().map(|turn| turn.attempts).sum()
    }

    /// The recorded turns; an empty session is an error.
    pub fn into_turns(self) -> Result<Vec<Turn>> {
        if self.turns.is_empty() {
            return Err(ParleyError::EmptySession);
        }
        Ok(self.turns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript(turns: Vec<Turn>) -> SessionTranscript {
        SessionTranscript {
            session_id: Uuid::new_v4(),
            backend_kind: BackendKind::GenericRest,
            scenario_title: "t".into(),
            turns,
            reason: TerminationReason::Exhausted,
            conversation_id: String::new(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn empty_transcripts_do_not_convert() {
        assert!(matches!(
            transcript(vec![]).into_turns(),
            Err(ParleyError::EmptySession)
        ));
    }

    #[test]
    fn serializes_reason_with_tag() {
        let json = serde_json::to_value(transcript(vec![])).unwrap();
        assert_eq!(json["reason"]["kind"], "exhausted");
        assert_eq!(json["backend_kind"], "generic_rest");
        assert!(json.get("conversation_id").is_none());
    }
}
