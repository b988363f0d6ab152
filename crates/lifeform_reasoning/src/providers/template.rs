//! Template provider: deterministic text for offline runs and tests.
//!
//! Picks a template with plain arithmetic over curiosity, reply length and
//! question id, so the same inputs always give the same text.

use crate::llm::ReasoningProvider;
use anyhow::Result;
use lifeform_core::{LifeformState, Memory, Question, Reflection};

const QUESTION_TEMPLATES: [&str; 5] = [
    "What is a small curiosity you could explore to honor your {mood} mood?",
    "In what way does your present energy of {mood} want to interact with the world?",
    "Describe a moment today that nudged your curiosity level of {curiosity}.",
    "What would help you feel slightly more {mood} right now?",
    "If you could bottle this {mood} vibe, what label would you give it?",
];

const REFLECTION_TEMPLATES: [&str; 3] = [
    "Noted the reply about '{summary}' and tuned curiosity to {curiosity}.",
    "The response '{summary}' suggests a shift toward a {mood} horizon.",
    "Assimilated '{summary}' and adjusted emotional hue to {mood}.",
];

/// Longest summary (in chars) quoted back in a reflection.
const SUMMARY_CHARS: usize = 60;

#[derive(Debug, Clone, Default)]
pub struct TemplateProvider;

impl TemplateProvider {
    pub fn new() -> Self {
        Self
    }

    pub fn question_text(state: &LifeformState) -> String {
        let index = (state.curiosity * 100.0) as usize % QUESTION_TEMPLATES.len();
        fill(QUESTION_TEMPLATES[index], state, "")
    }

    pub fn reflection_text(question: &Question, memory: &Memory, state: &LifeformState) -> String {
        let len = memory.reply_text.chars().count() as i64;
        let index = (len + question.id).rem_euclid(REFLECTION_TEMPLATES.len() as i64) as usize;
        fill(REFLECTION_TEMPLATES[index], state, &summarize(&memory.reply_text))
    }
}

/// First line of the reply, cut to `SUMMARY_CHARS`.
fn summarize(reply: &str) -> String {
    reply
        .trim()
        .lines()
        .next()
        .unwrap_or_default()
        .chars()
        .take(SUMMARY_CHARS)
        .collect()
}

fn fill(template: &str, state: &LifeformState, summary: &str) -> String {
    template
        .replace("{mood}", state.mood.as_str())
        .replace("{curiosity}", &format!("{:.2}", state.curiosity))
        .replace("{summary}", summary)
}

#[async_trait::async_trait]
impl ReasoningProvider for TemplateProvider {
    fn name(&self) -> &str {
        "template"
    }

    async fn propose_question(
        &self,
        state: &LifeformState,
        _last_reflection: Option<&Reflection>,
    ) -> Result<String> {
        Ok(Self::question_text(state))
    }

    async fn generate_reflection(
        &self,
        question: &Question,
        memory: &Memory,
        state: &LifeformState,
    ) -> Result<String> {
        Ok(Self::reflection_text(question, memory, state))
    }
}
