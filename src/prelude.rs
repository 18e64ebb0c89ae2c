//! Convenience re-exports for common use.

pub use crate::adapter::{create_adapter, SendOutcome, WireAdapter};
pub use crate::config::{BackendConfig, BackendKind, GenerationConfig, ParleyConfig, SessionSettings};
pub use crate::error::{ParleyError, Result};
pub use crate::extract::{ContentExtractor, ExtractionConfig};
pub use crate::generation::{ChatCompletionsService, GenerationService, Prompt, TurnGenerator};
pub use crate::session::{run_session, run_sessions, SessionPlan, SessionTranscript};
pub use crate::types::{
    Extraction, ExtractionMethod, Persona, RawResult, ReplyPayload, Scenario, TerminationReason,
    Turn,
};
