use anyhow::Result;
use async_trait::async_trait;
use lifeform_core::{LifeformState, Memory, Question, Reflection};

/// Text generation capability used by the metabolism engine.
///
/// Implementations may be slow or unavailable; the engine bounds every call
/// with a timeout and never holds a write transaction while awaiting one.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Produce the text of the next question to ask.
    async fn propose_question(
        &self,
        state: &LifeformState,
        last_reflection: Option<&Reflection>,
    ) -> Result<String>;

    /// Produce a reflection on a reply. `state` is the state before the reply is applied.
    async fn generate_reflection(
        &self,
        question: &Question,
        memory: &Memory,
        state: &LifeformState,
    ) -> Result<String>;
}
