//! Heartbeat - periodic metabolism tick
//!
//! Every interval the lifeform catches up on missed reflections and makes sure
//! a question is pending. Ticks never overlap: a tick that fires while the
//! previous one is still running is skipped.

use crate::engine::{MetabolismEngine, TickReport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug)]
pub enum TickOutcome {
    Completed(TickReport),
    /// Previous tick still in flight
    Skipped,
    Failed(String),
}

pub struct Heartbeat {
    engine: Arc<MetabolismEngine>,
    interval: Duration,
    running: Arc<AtomicBool>,
}

/// Clears the in-flight flag however the tick ends.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Heartbeat {
    pub fn new(engine: Arc<MetabolismEngine>, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run a single tick unless one is already running.
    pub async fn beat(&self) -> TickOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Heartbeat still running, skipping tick");
            return TickOutcome::Skipped;
        }
        let _guard = RunningGuard(Arc::clone(&self.running));

        match self.engine.tick().await {
            Ok(report) => {
                tracing::info!(
                    reflected = report.reflected,
                    question_id = report.pending_question.id,
                    "heartbeat.tick"
                );
                TickOutcome::Completed(report)
            }
            Err(e) => {
                tracing::warn!("Heartbeat tick failed: {}", e);
                TickOutcome::Failed(e.to_string())
            }
        }
    }

    /// Start ticking in the background. The first tick fires after one full interval.
    pub fn spawn(self) -> HeartbeatHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let heartbeat = Arc::new(self);

        let join = tokio::spawn(async move {
            let mut interval = tokio::time::interval(heartbeat.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // tokio's interval fires immediately once; startup already bootstrapped
            interval.tick().await;

            tracing::info!(
                "Heartbeat started (every {}s)",
                heartbeat.interval.as_secs_f64()
            );

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        // Detached so a slow tick lets the loop observe the next one and skip it
                        let hb = Arc::clone(&heartbeat);
                        tokio::spawn(async move {
                            hb.beat().await;
                        });
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            tracing::info!("Heartbeat stopped");
                            return;
                        }
                    }
                }
            }
        });

        HeartbeatHandle { shutdown_tx, join }
    }
}

pub struct HeartbeatHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl HeartbeatHandle {
    /// Stop scheduling ticks and wait for the loop to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            tracing::warn!("Heartbeat task ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ReasoningProvider;
    use crate::providers::TemplateProvider;
    use async_trait::async_trait;
    use lifeform_core::{LifeformState, Memory, Question, Reflection};
    use lifeform_memory::SqliteStore;

    struct SlowProvider(Duration);

    #[async_trait]
    impl ReasoningProvider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }

        async fn propose_question(
            &self,
            _state: &LifeformState,
            _last: Option<&Reflection>,
        ) -> anyhow::Result<String> {
            tokio::time::sleep(self.0).await;
            Ok("Is anyone there?".to_string())
        }

        async fn generate_reflection(
            &self,
            _q: &Question,
            _m: &Memory,
            _s: &LifeformState,
        ) -> anyhow::Result<String> {
            Ok("Someone was.".to_string())
        }
    }

    async fn engine(provider: Arc<dyn ReasoningProvider>) -> Arc<MetabolismEngine> {
        let store = Arc::new(SqliteStore::new(":memory:").await.unwrap());
        Arc::new(
            MetabolismEngine::open(store, provider, Duration::from_secs(5))
                .await
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_beat_creates_pending_question() {
        let engine = engine(Arc::new(TemplateProvider::new())).await;
        let heartbeat = Heartbeat::new(Arc::clone(&engine), Duration::from_secs(60));

        match heartbeat.beat().await {
            TickOutcome::Completed(report) => {
                assert_eq!(report.reflected, 0);
                assert!(report.pending_question.is_pending());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(engine.store().count_pending_questions().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_beats_skip() {
        let engine = engine(Arc::new(SlowProvider(Duration::from_millis(200)))).await;
        let heartbeat = Heartbeat::new(engine, Duration::from_secs(60));

        let (first, second) = tokio::join!(heartbeat.beat(), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            heartbeat.beat().await
        });

        assert!(matches!(first, TickOutcome::Completed(_)));
        assert!(matches!(second, TickOutcome::Skipped));
        // Flag is released once the tick finishes
        assert!(matches!(heartbeat.beat().await, TickOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn test_spawn_ticks_and_shuts_down() {
        let engine = engine(Arc::new(TemplateProvider::new())).await;
        let handle = Heartbeat::new(Arc::clone(&engine), Duration::from_millis(30)).spawn();

        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.shutdown().await;

        assert!(engine.store().pending_question().await.unwrap().is_some());
        assert_eq!(engine.store().count_pending_questions().await.unwrap(), 1);
    }
}
