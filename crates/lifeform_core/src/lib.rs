pub mod config;
pub mod error;
pub mod mood;
pub mod types;

pub use config::LifeformConfig;
pub use error::MetabolismError;
pub use mood::{apply_reply, curiosity_delta, mood_for_reply, MOOD_CYCLE};
pub use types::{
    LifeformState, Memory, Mood, MoodView, Question, QuestionStatus, QuestionView, Reflection,
    ReflectionView, StateSnapshot,
};
