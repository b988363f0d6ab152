use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Question
// ============================================================================

/// Lifecycle of a question. The only transition is `Pending -> Answered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
    Pending,
    Answered,
}

impl QuestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionStatus::Pending => "pending",
            QuestionStatus::Answered => "answered",
        }
    }
}

impl FromStr for QuestionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(QuestionStatus::Pending),
            "answered" => Ok(QuestionStatus::Answered),
            other => Err(format!("unknown question status '{}'", other)),
        }
    }
}

/// A question the lifeform asked itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub text: String,
    pub status: QuestionStatus,
    pub created_at: DateTime<Utc>,
}

impl Question {
    pub fn is_pending(&self) -> bool {
        self.status == QuestionStatus::Pending
    }
}

/// The stored reply to a question. Exactly one per answered question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: i64,
    pub question_id: i64,
    pub reply_text: String,
    pub created_at: DateTime<Utc>,
}

/// Text produced after a reply has been ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Mood & LifeformState
// ============================================================================

/// The five moods, in cycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Curious,
    Playful,
    Thoughtful,
    Grounded,
    Radiant,
}

impl Mood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Curious => "curious",
            Mood::Playful => "playful",
            Mood::Thoughtful => "thoughtful",
            Mood::Grounded => "grounded",
            Mood::Radiant => "radiant",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "curious" => Ok(Mood::Curious),
            "playful" => Ok(Mood::Playful),
            "thoughtful" => Ok(Mood::Thoughtful),
            "grounded" => Ok(Mood::Grounded),
            "radiant" => Ok(Mood::Radiant),
            other => Err(format!("unknown mood '{}'", other)),
        }
    }
}

/// The singleton emotional state of the lifeform.
///
/// `revision` increases by one on every committed update, so cached copies
/// can tell which of two states is newer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeformState {
    pub mood: Mood,
    /// Always within [0.0, 1.0]
    pub curiosity: f64,
    pub last_reflected_at: Option<DateTime<Utc>>,
    pub revision: i64,
}

impl Default for LifeformState {
    fn default() -> Self {
        Self {
            mood: Mood::Curious,
            curiosity: 0.5,
            last_reflected_at: None,
            revision: 0,
        }
    }
}

// ============================================================================
// Snapshot payload
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: i64,
    pub text: String,
}

impl From<&Question> for QuestionView {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id,
            text: q.text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionView {
    pub id: i64,
    pub text: String,
}

impl From<&Reflection> for ReflectionView {
    fn from(r: &Reflection) -> Self {
        Self {
            id: r.id,
            text: r.text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodView {
    pub mood: Mood,
    pub curiosity: f64,
}

/// What callers of the request surface see after every operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub pending_question: Option<QuestionView>,
    pub last_reflection: Option<ReflectionView>,
    pub memories_count: i64,
    pub state: MoodView,
}

impl StateSnapshot {
    pub fn new(
        state: &LifeformState,
        pending: Option<&Question>,
        last_reflection: Option<&Reflection>,
        memories_count: i64,
    ) -> Self {
        Self {
            pending_question: pending.map(QuestionView::from),
            last_reflection: last_reflection.map(ReflectionView::from),
            memories_count,
            state: MoodView {
                mood: state.mood,
                curiosity: state.curiosity,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mood_string_roundtrip() {
        for mood in crate::MOOD_CYCLE {
            assert_eq!(mood.as_str().parse::<Mood>().unwrap(), mood);
        }
        assert!("melancholy".parse::<Mood>().is_err());
    }

    #[test]
    fn test_question_status_parse() {
        assert_eq!("pending".parse::<QuestionStatus>(), Ok(QuestionStatus::Pending));
        assert_eq!("answered".parse::<QuestionStatus>(), Ok(QuestionStatus::Answered));
        assert!("archived".parse::<QuestionStatus>().is_err());
    }

    #[test]
    fn test_snapshot_json_shape() {
        let state = LifeformState::default();
        let question = Question {
            id: 7,
            text: "What sparks you?".into(),
            status: QuestionStatus::Pending,
            created_at: Utc::now(),
        };
        let snapshot = StateSnapshot::new(&state, Some(&question), None, 3);
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["pending_question"]["id"], 7);
        assert_eq!(json["pending_question"]["text"], "What sparks you?");
        assert!(json["last_reflection"].is_null());
        assert_eq!(json["memories_count"], 3);
        assert_eq!(json["state"]["mood"], "curious");
        assert_eq!(json["state"]["curiosity"], 0.5);
    }
}
