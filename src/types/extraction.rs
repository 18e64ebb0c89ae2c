//! Extraction strategy labels and candidates.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Strategy that produced an answer, in pipeline priority order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExtractionMethod {
    NestedToolOutput,
    DirectField,
    Delimiter,
    StreamDeltas,
    Passthrough,
}

/// A possible answer proposed by one strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionCandidate {
    pub text: String,
    pub source: ExtractionMethod,
    /// Length in characters.
    pub length: usize,
    pub is_system_bookkeeping: bool,
}

impl ExtractionCandidate {
    pub fn new(text: String, source: ExtractionMethod, is_system_bookkeeping: bool) -> Self {
        let length = text.chars().count();
        Self {
            text,
            source,
            length,
            is_system_bookkeeping,
        }
    }
}

/// The winning answer of an extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub answer: String,
    pub method: ExtractionMethod,
}
