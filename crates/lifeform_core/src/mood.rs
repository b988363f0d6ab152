//! Deterministic mood/curiosity update
//!
//! Every ingested reply nudges curiosity by an amount proportional to how long
//! the reply was, then derives the mood from the new curiosity. A handful of
//! keywords in the reply override the derived mood.

use crate::types::{LifeformState, Mood};
use chrono::{DateTime, Utc};

/// Mood cycle indexed by `floor(curiosity * 10) mod 5`.
pub const MOOD_CYCLE: [Mood; 5] = [
    Mood::Curious,
    Mood::Playful,
    Mood::Thoughtful,
    Mood::Grounded,
    Mood::Radiant,
];

/// Reply length (in chars) that leaves curiosity unchanged.
const NEUTRAL_REPLY_LEN: f64 = 120.0;
const DELTA_SCALE: f64 = 800.0;
const MAX_DELTA: f64 = 0.08;

/// Keyword overrides, checked in order. First match wins.
const KEYWORD_OVERRIDES: [(&[&str], usize); 3] = [
    (&["calm", "ground", "rest"], 3),
    (&["excite", "joy", "spark"], 1),
    (&["reflect", "ponder", "learn"], 2),
];

fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// Curiosity change caused by a reply, in [-0.08, 0.08].
pub fn curiosity_delta(reply: &str) -> f64 {
    let len = reply.trim().chars().count() as f64;
    clamp((len - NEUTRAL_REPLY_LEN) / DELTA_SCALE, -MAX_DELTA, MAX_DELTA)
}

/// Mood for a reply given the curiosity it produced.
pub fn mood_for_reply(reply: &str, curiosity: f64) -> Mood {
    let content = reply.trim().to_lowercase();
    let index = KEYWORD_OVERRIDES
        .iter()
        .find(|(words, _)| words.iter().any(|w| content.contains(w)))
        .map(|(_, index)| *index)
        .unwrap_or_else(|| (curiosity * 10.0).floor() as usize % MOOD_CYCLE.len());
    MOOD_CYCLE[index]
}

/// Apply a reply to `state`, producing the next state.
///
/// `revision` is carried over unchanged; the store bumps it on write.
pub fn apply_reply(state: &LifeformState, reply: &str, now: DateTime<Utc>) -> LifeformState {
    let curiosity = clamp(state.curiosity + curiosity_delta(reply), 0.0, 1.0);
    LifeformState {
        mood: mood_for_reply(reply, curiosity),
        curiosity,
        last_reflected_at: Some(now),
        revision: state.revision,
    }
}
