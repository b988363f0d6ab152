use lifeform_core::{LifeformState, Memory, Question, Reflection};

pub const SYSTEM_PROMPT: &str = "You are a small artificial lifeform that keeps asking itself \
questions, listens to the answers it receives, and reflects on them. \
Answer with plain text only: one or two sentences, no lists, no markdown, no quotes.";

/// Longest generated text kept, in chars.
const MAX_OUTPUT_CHARS: usize = 500;

pub struct PromptBuilder;

impl PromptBuilder {
    pub fn question_prompt(state: &LifeformState, last_reflection: Option<&Reflection>) -> String {
        let reflection = last_reflection
            .map(|r| r.text.as_str())
            .unwrap_or("(nothing yet)");
        format!(
            "Current mood: {}\nCurrent curiosity: {:.2} (0 = dull, 1 = burning)\n\
             Most recent reflection: {}\n\n\
             Ask yourself one new, open question that fits this mood and curiosity.",
            state.mood, state.curiosity, reflection
        )
    }

    pub fn reflection_prompt(question: &Question, memory: &Memory, state: &LifeformState) -> String {
        format!(
            "Current mood: {}\nCurrent curiosity: {:.2}\n\n\
             You asked: {}\nThe reply was: {}\n\n\
             Reflect briefly on what this reply means to you.",
            state.mood, state.curiosity, question.text, memory.reply_text
        )
    }
}

/// Normalize model output into a single plain paragraph.
///
/// Strips markdown headers/bullets, a leading `Question:`/`Reflection:` label and
/// wrapping quotes, collapses whitespace, and caps the length.
pub fn clean_generated_text(raw: &str) -> String {
    let joined = raw
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches('#')
                .trim_start_matches(['-', '*'])
                .trim()
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let mut text = joined.split_whitespace().collect::<Vec<_>>().join(" ");

    for label in ["Question:", "Reflection:"] {
        if let Some(rest) = text.strip_prefix(label) {
            text = rest.trim_start().to_string();
        }
    }

    let quotes: &[char] = &['"', '\'', '“', '”'];
    let text = text.trim_matches(quotes).trim();

    text.chars().take(MAX_OUTPUT_CHARS).collect::<String>().trim_end().to_string()
}
