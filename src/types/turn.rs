//! Dialogue inputs and recorded turns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::extraction::ExtractionMethod;

/// One outgoing-message / incoming-reply pair. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    /// 1-based, contiguous within a session.
    pub index: u32,
    pub outgoing_message: String,
    /// Response body exactly as the backend sent it.
    pub raw_response: String,
    /// Never empty.
    pub extracted_answer: String,
    pub extraction_method: ExtractionMethod,
    /// Continuity token in effect after this turn.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub continuity_token: String,
    /// Attempts needed to obtain the reply.
    pub attempts: u32,
    pub timestamp: DateTime<Utc>,
}

/// What the synthetic user is trying to get done.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    pub title: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub goal: String,
}

impl Scenario {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }
}

/// Who the synthetic user pretends to be.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Persona {
    pub role: String,
    #[serde(default)]
    pub communication_style: String,
    #[serde(default)]
    pub work_environment: String,
    /// Phrases that illustrate how this user talks.
    #[serde(default)]
    pub sample_expressions: Vec<String>,
    /// Canned openers used when the opening message cannot be generated.
    #[serde(default)]
    pub opening_lines: Vec<String>,
}

impl Persona {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            ..Self::default()
        }
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.communication_style = style.into();
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.work_environment = environment.into();
        self
    }

    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.sample_expressions.push(expression.into());
        self
    }

    pub fn with_opening_line(mut self, line: impl Into<String>) -> Self {
        self.opening_lines.push(line.into());
        self
    }
}
