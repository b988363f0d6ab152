//! Metabolism Engine - the question → reply → reflection cycle
//!
//! Owns every multi-step invariant of the lifeform:
//! - at most one pending question (enforced by the store's unique index,
//!   creation is a single conditional insert)
//! - a reply is accepted once: the pending → answered flip is a guarded update
//!   committed together with the memory
//! - reflection and state update commit together, one read-modify-write per reply
//!
//! Provider calls happen outside of any write transaction and are bounded by
//! `provider_timeout`. A failed call aborts before anything is written.

use crate::llm::ReasoningProvider;
use chrono::Utc;
use lifeform_core::{
    apply_reply, LifeformState, Memory, MetabolismError, Question, Reflection, StateSnapshot,
};
use lifeform_memory::SqliteStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

type Result<T> = std::result::Result<T, MetabolismError>;

/// Attempts at settling "check pending, else create" before giving up.
const MAX_CREATE_ATTEMPTS: usize = 3;

/// Process-wide handle on the singleton lifeform state.
///
/// Obtained once at startup and refreshed after every committed state write.
/// A refresh carrying an older revision than the cached one is ignored, so
/// racing refreshes never move the cache backwards.
#[derive(Clone)]
pub struct LifeformHandle {
    state: Arc<RwLock<LifeformState>>,
}

impl LifeformHandle {
    fn new(state: LifeformState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub async fn current(&self) -> LifeformState {
        self.state.read().await.clone()
    }

    /// Returns whether the cached state was replaced.
    pub async fn refresh(&self, committed: LifeformState) -> bool {
        let mut guard = self.state.write().await;
        if committed.revision >= guard.revision {
            *guard = committed;
            true
        } else {
            false
        }
    }
}

/// What one heartbeat accomplished.
#[derive(Debug, Clone)]
pub struct TickReport {
    /// Memories reflected on during this tick (left over from failed reflections)
    pub reflected: usize,
    pub pending_question: Question,
}

pub struct MetabolismEngine {
    store: Arc<SqliteStore>,
    provider: Arc<dyn ReasoningProvider>,
    lifeform: LifeformHandle,
    provider_timeout: Duration,
}

impl MetabolismEngine {
    /// Ensure the singleton state exists and take the process-wide handle on it.
    pub async fn open(
        store: Arc<SqliteStore>,
        provider: Arc<dyn ReasoningProvider>,
        provider_timeout: Duration,
    ) -> Result<Self> {
        let state = store.ensure_lifeform().await?;
        check_curiosity(&state)?;
        tracing::debug!(
            "Lifeform state loaded: mood={} curiosity={:.2} revision={}",
            state.mood,
            state.curiosity,
            state.revision
        );
        Ok(Self {
            store,
            provider,
            lifeform: LifeformHandle::new(state),
            provider_timeout,
        })
    }

    pub fn store(&self) -> &Arc<SqliteStore> {
        &self.store
    }

    pub fn lifeform(&self) -> &LifeformHandle {
        &self.lifeform
    }

    /// Make sure a question is waiting. Failures are logged, not fatal.
    pub async fn bootstrap(&self) -> Option<Question> {
        match self.generate_question().await {
            Ok(q) => Some(q),
            Err(e) => {
                tracing::error!("Bootstrap could not create a pending question: {}", e);
                None
            }
        }
    }

    // =========================================================================
    // Questions
    // =========================================================================

    /// Return the pending question, creating one if none exists. Idempotent.
    pub async fn generate_question(&self) -> Result<Question> {
        if let Some(existing) = self.store.pending_question().await? {
            return Ok(existing);
        }

        let state = self.lifeform.current().await;
        let last_reflection = self.store.latest_reflection().await?;
        let text = self
            .call_provider(
                "propose_question",
                self.provider.propose_question(&state, last_reflection.as_ref()),
            )
            .await?;

        for _ in 0..MAX_CREATE_ATTEMPTS {
            if let Some(question) = self
                .store
                .insert_pending_question(&text, Utc::now())
                .await?
            {
                tracing::info!(
                    question_id = question.id,
                    text = %question.text,
                    "question.generated"
                );
                return Ok(question);
            }

            // Someone else created one first; theirs is the pending question
            if let Some(existing) = self.store.pending_question().await? {
                tracing::debug!(
                    question_id = existing.id,
                    "Concurrent generate_question lost the race, reusing pending question"
                );
                return Ok(existing);
            }
        }

        Err(MetabolismError::InvariantViolation(
            "pending question kept changing while creating a new one".to_string(),
        ))
    }

    /// Administrative escape hatch: always ask the provider for a fresh question.
    ///
    /// If a question is pending its text is replaced in place (same id);
    /// otherwise a new pending question is inserted. Both happen inside one
    /// write transaction, so the single-pending guarantee holds.
    pub async fn force_new_question(&self) -> Result<StateSnapshot> {
        let state = self.lifeform.current().await;
        let last_reflection = self.store.latest_reflection().await?;
        let text = self
            .call_provider(
                "propose_question",
                self.provider.propose_question(&state, last_reflection.as_ref()),
            )
            .await?;

        let now = Utc::now();
        let mut uow = self.store.begin().await?;
        let question = match uow.rewrite_pending_question(&text, now).await? {
            Some(q) => q,
            None => uow.insert_pending_question(&text, now).await?.ok_or_else(|| {
                MetabolismError::InvariantViolation(
                    "pending question appeared inside a write transaction".to_string(),
                )
            })?,
        };
        uow.commit().await?;

        tracing::info!(question_id = question.id, text = %question.text, "question.forced");
        self.snapshot().await
    }

    // =========================================================================
    // Replies
    // =========================================================================

    /// Accept a reply to the pending question, reflect on it and line up the
    /// next question.
    ///
    /// Once the memory is committed the reply counts as accepted: a failing
    /// reflection or question generation afterwards is logged, and the next
    /// heartbeat finishes the cycle.
    pub async fn ingest_reply(&self, question_id: i64, reply_text: &str) -> Result<StateSnapshot> {
        let reply = reply_text.trim();
        if reply.is_empty() {
            return Err(MetabolismError::Validation(
                "text must be provided".to_string(),
            ));
        }

        let mut uow = self.store.begin().await?;
        let question = match uow.answer_question(question_id).await? {
            Some(q) => q,
            None => {
                uow.rollback().await?;
                return Err(MetabolismError::NotFoundOrAlreadyAnswered);
            }
        };
        let memory = uow.insert_memory(question.id, reply, Utc::now()).await?;
        uow.commit().await?;

        tracing::info!(
            question_id = question.id,
            memory_id = memory.id,
            length = reply.chars().count(),
            "reply.ingested"
        );

        let state = self.lifeform.current().await;
        if let Err(e) = self.reflect_on_memory(&question, &memory, &state).await {
            tracing::error!(
                question_id = question.id,
                "Reflection failed, will retry on next heartbeat: {}",
                e
            );
        }

        if let Err(e) = self.generate_question().await {
            tracing::error!("Could not line up the next question: {}", e);
        }

        self.snapshot().await
    }

    /// Produce and store the reflection for `memory`, updating mood and curiosity.
    ///
    /// `state` is what the provider sees; the update itself is computed from the
    /// state read inside the write transaction. If the question already has a
    /// reflection, that one is returned and the state is left untouched.
    pub async fn reflect_on_memory(
        &self,
        question: &Question,
        memory: &Memory,
        state: &LifeformState,
    ) -> Result<Reflection> {
        let text = self
            .call_provider(
                "generate_reflection",
                self.provider.generate_reflection(question, memory, state),
            )
            .await?;

        let now = Utc::now();
        let mut uow = self.store.begin().await?;
        let reflection = match uow.insert_reflection(question.id, &text, now).await? {
            Some(r) => r,
            None => {
                uow.rollback().await?;
                tracing::debug!(question_id = question.id, "Question already reflected on");
                return self.store.reflection_for(question.id).await?.ok_or_else(|| {
                    MetabolismError::InvariantViolation(format!(
                        "reflection for question {} vanished",
                        question.id
                    ))
                });
            }
        };

        let current = uow.load_lifeform().await?;
        let next = apply_reply(&current, &memory.reply_text, now);
        check_curiosity(&next)?;
        let saved = uow.save_lifeform(&next).await?;
        uow.commit().await?;

        self.lifeform.refresh(saved.clone()).await;
        tracing::info!(
            question_id = question.id,
            reflection_id = reflection.id,
            mood = %saved.mood,
            curiosity = saved.curiosity,
            "reflection.created"
        );
        Ok(reflection)
    }

    /// Reflect on memories whose reflection never got written.
    ///
    /// A memory whose reflection fails is logged and skipped so it cannot hold
    /// back the ones after it; it is tried again on the next call.
    pub async fn reflect_outstanding(&self) -> Result<usize> {
        let outstanding = self.store.unreflected_memories().await?;
        let mut reflected = 0;
        for (question, memory) in outstanding {
            let state = self.lifeform.current().await;
            match self.reflect_on_memory(&question, &memory, &state).await {
                Ok(_) => reflected += 1,
                Err(e) => tracing::warn!(
                    question_id = question.id,
                    "Outstanding reflection failed, skipping for now: {}",
                    e
                ),
            }
        }
        if reflected > 0 {
            tracing::info!("Caught up on {} outstanding reflection(s)", reflected);
        }
        Ok(reflected)
    }

    /// One heartbeat: catch up on outstanding reflections, then make sure a question is pending.
    ///
    /// Reconciliation trouble never keeps the tick from lining up a question.
    pub async fn tick(&self) -> Result<TickReport> {
        let reflected = match self.reflect_outstanding().await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!("Reconciliation failed: {}", e);
                0
            }
        };
        let pending_question = self.generate_question().await?;
        Ok(TickReport {
            reflected,
            pending_question,
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current pending question, last reflection, memory count and mood.
    ///
    /// If nothing is pending, a question is generated first. When the provider
    /// is unavailable the snapshot comes back with no pending question.
    pub async fn read_state(&self) -> Result<StateSnapshot> {
        match self.generate_question().await {
            Ok(_) => {}
            Err(MetabolismError::ProviderUnavailable(e)) => {
                tracing::warn!("No pending question while reading state: {}", e);
            }
            Err(e) => return Err(e),
        }
        self.snapshot().await
    }

    async fn snapshot(&self) -> Result<StateSnapshot> {
        let pending = self.store.pending_question().await?;
        let last_reflection = self.store.latest_reflection().await?;
        let memories_count = self.store.count_memories().await?;
        let state = self.lifeform.current().await;
        Ok(StateSnapshot::new(
            &state,
            pending.as_ref(),
            last_reflection.as_ref(),
            memories_count,
        ))
    }

    async fn call_provider<F>(&self, operation: &'static str, call: F) -> Result<String>
    where
        F: Future<Output = anyhow::Result<String>>,
    {
        let outcome = tokio::time::timeout(self.provider_timeout, call).await;
        let message = match outcome {
            Ok(Ok(text)) => {
                let text = text.trim();
                if !text.is_empty() {
                    return Ok(text.to_string());
                }
                format!("{} returned empty text", operation)
            }
            Ok(Err(e)) => format!("{} failed: {:#}", operation, e),
            Err(_) => format!(
                "{} timed out after {:.1}s",
                operation,
                self.provider_timeout.as_secs_f64()
            ),
        };
        tracing::warn!(provider = self.provider.name(), "{}", message);
        Err(MetabolismError::ProviderUnavailable(message))
    }
}

fn check_curiosity(state: &LifeformState) -> Result<()> {
    if (0.0..=1.0).contains(&state.curiosity) {
        Ok(())
    } else {
        Err(MetabolismError::InvariantViolation(format!(
            "curiosity {} outside [0, 1]",
            state.curiosity
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifeform_core::Mood;

    fn state(revision: i64, mood: Mood) -> LifeformState {
        LifeformState {
            mood,
            revision,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_handle_ignores_older_revision() {
        let handle = LifeformHandle::new(state(3, Mood::Curious));

        assert!(!handle.refresh(state(2, Mood::Radiant)).await);
        assert_eq!(handle.current().await.mood, Mood::Curious);

        assert!(handle.refresh(state(4, Mood::Playful)).await);
        assert_eq!(handle.current().await.mood, Mood::Playful);
        assert_eq!(handle.current().await.revision, 4);
    }

    #[test]
    fn test_check_curiosity() {
        let mut s = LifeformState::default();
        assert!(check_curiosity(&s).is_ok());
        s.curiosity = 1.0;
        assert!(check_curiosity(&s).is_ok());
        s.curiosity = -0.01;
        assert!(matches!(
            check_curiosity(&s),
            Err(MetabolismError::InvariantViolation(_))
        ));
        s.curiosity = f64::NAN;
        assert!(check_curiosity(&s).is_err());
    }
}
