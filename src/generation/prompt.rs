//! Prompts that ask the generation service to speak as the persona.

use std::fmt::Write;

use crate::types::{Persona, Scenario, Turn};

/// Reply excerpt length included in follow-up prompts.
pub const REPLY_EXCERPT_CHARS: usize = 200;
/// Recent turns included in follow-up prompts.
pub const HISTORY_WINDOW: usize = 2;
/// Sample expressions shown to the model.
const SAMPLE_EXPRESSIONS: usize = 3;

fn or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn opening_prompt(scenario: &Scenario, persona: &Persona) -> String {
    let role = or(&persona.role, "professional user");
    let style = or(&persona.communication_style, "professional");
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You are a {role} working in {}.",
        or(&persona.work_environment, "a professional environment")
    );
    let _ = writeln!(prompt, "Your communication style: {style}.");
    let _ = writeln!(prompt, "Scenario: {}", or(&scenario.title, "professional consultation"));
    let _ = writeln!(prompt, "Background: {}", or(&scenario.context, "a work task"));
    if !scenario.goal.trim().is_empty() {
        let _ = writeln!(prompt, "What you want to get done: {}", scenario.goal);
    }
    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "Write one short opening question or request for an AI assistant:"
    );
    let _ = writeln!(prompt, "1. It reflects who you are as a {role}.");
    let _ = writeln!(prompt, "2. It is phrased in a {style} way.");
    let _ = writeln!(
        prompt,
        "3. It may be a little vague so the assistant has to ask for details."
    );
    let _ = writeln!(prompt, "4. Keep it between 10 and 30 words, without quotes.");
    if !persona.sample_expressions.is_empty() {
        let samples: Vec<&str> = persona
            .sample_expressions
            .iter()
            .take(SAMPLE_EXPRESSIONS)
            .map(String::as_str)
            .collect();
        let _ = writeln!(prompt, "\nStyle reference only, do not copy: {}", samples.join(", "));
    }
    let _ = write!(prompt, "\nOutput only the message itself.");
    prompt
}

pub fn follow_up_prompt(
    scenario: &Scenario,
    persona: &Persona,
    history: &[Turn],
    last_reply: &str,
) -> String {
    let role = or(&persona.role, "professional user");
    let style = or(&persona.communication_style, "professional");
    let mut prompt = String::new();
    let _ = writeln!(prompt, "You are a {role} talking to an AI assistant.");
    let _ = writeln!(prompt, "Communication style: {style}.");
    let _ = writeln!(prompt, "Scenario: {}", or(&scenario.title, "professional consultation"));
    if !scenario.goal.trim().is_empty() {
        let _ = writeln!(prompt, "Your goal: {}", scenario.goal);
    }

    let _ = writeln!(prompt, "\nConversation so far:");
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    for turn in &history[start..] {
        let _ = writeln!(prompt, "Turn {} - me: {}", turn.index, turn.outgoing_message);
    }
    let _ = writeln!(
        prompt,
        "The assistant just replied: {}",
        excerpt(last_reply, REPLY_EXCERPT_CHARS)
    );

    let _ = writeln!(
        prompt,
        "\nThis is turn {}. Based on the reply, write your next message:",
        history.len() + 1
    );
    let _ = writeln!(
        prompt,
        "1. Continue naturally from what the assistant said."
    );
    let _ = writeln!(
        prompt,
        "2. Ask for details, ask for clarification, or raise a related question."
    );
    let _ = writeln!(prompt, "3. Stay in character as a {role}.");
    let _ = writeln!(prompt, "4. Keep it between 10 and 40 words.");
    let _ = writeln!(
        prompt,
        "5. If the assistant has fully answered your question, reply with END."
    );
    let _ = write!(prompt, "\nOutput only the message itself.");
    prompt
}
