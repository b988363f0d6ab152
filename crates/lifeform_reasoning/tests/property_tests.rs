//! Property-based tests for generated-text handling and the template provider.

use chrono::Utc;
use lifeform_core::{LifeformState, Memory, Mood, Question, QuestionStatus, MOOD_CYCLE};
use lifeform_reasoning::prompts::clean_generated_text;
use lifeform_reasoning::providers::TemplateProvider;
use proptest::prelude::*;

fn arb_state() -> impl Strategy<Value = LifeformState> {
    (0usize..5, 0.0f64..=1.0).prop_map(|(i, curiosity)| LifeformState {
        mood: MOOD_CYCLE[i],
        curiosity,
        ..Default::default()
    })
}

proptest! {
    /// Cleaned output is a single bounded line without surrounding whitespace.
    #[test]
    fn clean_output_is_single_bounded_line(raw in "\\PC{0,800}(\n\\PC{0,80}){0,5}") {
        let cleaned = clean_generated_text(&raw);
        prop_assert!(!cleaned.contains('\n'));
        prop_assert!(cleaned.chars().count() <= 500);
        prop_assert_eq!(cleaned.trim(), cleaned.as_str());
    }

    /// Plain lowercase words pass through unchanged.
    #[test]
    fn clean_plain_words_untouched(words in prop::collection::vec("[a-z]{1,10}", 1..20)) {
        let text = words.join(" ");
        prop_assert_eq!(clean_generated_text(&text), text);
    }

    /// The template provider never returns blank text and always mentions the mood
    /// or curiosity it was given.
    #[test]
    fn template_question_reflects_state(state in arb_state()) {
        let text = TemplateProvider::question_text(&state);
        prop_assert!(!text.trim().is_empty());
        let curiosity = format!("{:.2}", state.curiosity);
        prop_assert!(text.contains(state.mood.as_str()) || text.contains(&curiosity));
    }

    /// Same inputs, same reflection.
    #[test]
    fn template_reflection_deterministic(
        state in arb_state(),
        reply in "[a-zA-Z ]{1,300}",
        id in 1i64..10_000,
    ) {
        let question = Question {
            id,
            text: "What is on your mind?".into(),
            status: QuestionStatus::Answered,
            created_at: Utc::now(),
        };
        let memory = Memory {
            id: 1,
            question_id: id,
            reply_text: reply,
            created_at: Utc::now(),
        };
        let a = TemplateProvider::reflection_text(&question, &memory, &state);
        let b = TemplateProvider::reflection_text(&question, &memory, &state);
        prop_assert_eq!(a, b);
    }
}

#[test]
fn every_mood_has_a_template_question() {
    for mood in MOOD_CYCLE {
        let state = LifeformState {
            mood,
            curiosity: 0.5,
            ..Default::default()
        };
        assert!(!TemplateProvider::question_text(&state).is_empty());
    }
    assert_eq!(MOOD_CYCLE[3], Mood::Grounded);
}
