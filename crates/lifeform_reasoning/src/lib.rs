pub mod engine;
pub mod heartbeat;
pub mod llm;
pub mod prompts;
pub mod providers;
pub mod retry;

pub use engine::{LifeformHandle, MetabolismEngine, TickReport};
pub use heartbeat::{Heartbeat, HeartbeatHandle, TickOutcome};
pub use llm::ReasoningProvider;
pub use providers::{create_provider, ProviderKind};
