//! End-of-conversation conditions for generated user messages.

use regex::Regex;

use crate::types::VerdictReason;

/// Tokens that end a conversation when they make up the whole message.
pub const END_TOKENS: &[&str] = &["END", "FINISH", "DONE", "结束", "完成"];

/// Phrases a satisfied user says instead of asking on.
pub const SATISFACTION_PHRASES: &[&str] = &[
    "that answers my question",
    "no further questions",
    "that's all i needed",
    "that is all i needed",
    "thanks, that's all",
    "没有其他问题",
    "我没有问题了",
];

/// A condition that ends the conversation after a generated message.
pub trait EndCondition: Send + Sync {
    /// `Some(reason)` when `text` (already cleaned) should end the dialogue.
    fn check(&self, text: &str) -> Option<VerdictReason>;
}

/// End on an explicit end token.
///
/// Matches the whole message case-insensitively, or an ASCII token written
/// as a standalone upper-case word ("OK, DONE").
pub struct EndTokenStop {
    tokens: Vec<String>,
    word: Option<Regex>,
}

impl EndTokenStop {
    pub fn new<I, S>(tokens: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let ascii: Vec<String> = tokens
            .iter()
            .filter(|token| token.is_ascii())
            .map(|token| regex::escape(token))
            .collect();
        let word = if ascii.is_empty() {
            None
        } else {
            Some(Regex::new(&format!(r"\b(?:{})\b", ascii.join("|")))?)
        };
        Ok(Self { tokens, word })
    }
}

impl Default for EndTokenStop {
    fn default() -> Self {
        Self::new(END_TOKENS.iter().copied()).expect("end token regex must compile")
    }
}

impl EndCondition for EndTokenStop {
    fn check(&self, text: &str) -> Option<VerdictReason> {
        let text = text.trim();
        if let Some(token) = self
            .tokens
            .iter()
            .find(|token| text.to_lowercase() == token.to_lowercase())
        {
            return Some(VerdictReason::EndToken {
                token: token.clone(),
            });
        }
        let found = self.word.as_ref()?.find(text)?;
        Some(VerdictReason::EndToken {
            token: found.as_str().to_string(),
        })
    }
}

/// End when the message contains a satisfaction phrase (case-insensitive).
pub struct PhraseStop {
    phrases: Vec<String>,
}

impl PhraseStop {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            phrases: phrases
                .into_iter()
                .map(|phrase| phrase.into().to_lowercase())
                .collect(),
        }
    }
}

impl Default for PhraseStop {
    fn default() -> Self {
        Self::new(SATISFACTION_PHRASES.iter().copied())
    }
}

impl EndCondition for PhraseStop {
    fn check(&self, text: &str) -> Option<VerdictReason> {
        let lower = text.to_lowercase();
        self.phrases
            .iter()
            .find(|phrase| lower.contains(phrase.as_str()))
            .map(|phrase| VerdictReason::Satisfied {
                phrase: phrase.clone(),
            })
    }
}

/// End when a custom predicate returns true.
pub struct PredicateStop<F: Fn(&str) -> bool + Send + Sync> {
    predicate: F,
}

impl<F: Fn(&str) -> bool + Send + Sync> PredicateStop<F> {
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F: Fn(&str) -> bool + Send + Sync> EndCondition for PredicateStop<F> {
    fn check(&self, text: &str) -> Option<VerdictReason> {
        (self.predicate)(text).then(|| VerdictReason::Satisfied {
            phrase: text.to_string(),
        })
    }
}

/// Strip surrounding quotes and trailing sentence punctuation.
pub fn clean_generated(text: &str) -> String {
    const QUOTES: &[char] = &['"', '\'', '“', '”', '‘', '’', '「', '」', '`'];
    const TRAILING: &[char] = &['。', '？', '！', '!', '.', '．'];
    text.trim()
        .trim_matches(QUOTES)
        .trim()
        .trim_end_matches(TRAILING)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_token_as_whole_message() {
        let stop = EndTokenStop::default();
        assert!(stop.check("END").is_some());
        assert!(stop.check("done").is_some());
        assert!(stop.check("结束").is_some());
        assert!(stop.check("Could you recommend a hotel").is_none());
        assert!(stop.check("我完成了报名，下一步呢").is_none());
    }

    #[test]
    fn end_token_as_standalone_upper_case_word() {
        let stop = EndTokenStop::default();
        assert_eq!(
            stop.check("Great, thanks. END"),
            Some(VerdictReason::EndToken {
                token: "END".into()
            })
        );
        assert!(stop.check("We are done with the first part, what next").is_none());
        assert!(stop.check("The ENDPOINT returns 404").is_none());
    }

    #[test]
    fn phrases_match_case_insensitively() {
        let stop = PhraseStop::default();
        assert!(stop.check("Perfect, That answers my question").is_some());
        assert!(stop.check("What about weekends").is_none());
    }

    #[test]
    fn predicate_stop() {
        let stop = PredicateStop::new(|text: &str| text.len() > 100);
        assert!(stop.check("short").is_none());
        assert!(stop.check(&"x".repeat(101)).is_some());
    }

    #[test]
    fn cleaning_strips_quotes_and_trailing_punctuation() {
        assert_eq!(clean_generated("  \"What time is it?\"  "), "What time is it?");
        assert_eq!(clean_generated("“帮我查一下订单。”"), "帮我查一下订单");
        assert_eq!(clean_generated("'END.'"), "END");
    }
}
