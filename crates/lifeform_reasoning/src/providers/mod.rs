pub mod openai;
pub mod template;

pub use openai::OpenAiProvider;
pub use template::TemplateProvider;

use crate::llm::ReasoningProvider;
use anyhow::Result;
use lifeform_core::config::LlmConfig;
use std::str::FromStr;
use std::sync::Arc;

/// The provider variants that can back the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Deterministic templates, no external calls
    Template,
    /// OpenAI-compatible remote model
    OpenAi,
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "template" | "stub" | "mock" => Ok(ProviderKind::Template),
            "openai" => Ok(ProviderKind::OpenAi),
            other => anyhow::bail!("unknown llm provider '{}'", other),
        }
    }
}

/// Build the configured provider. Callers only ever see the trait object.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn ReasoningProvider>> {
    let provider: Arc<dyn ReasoningProvider> = match config.provider.parse::<ProviderKind>()? {
        ProviderKind::Template => Arc::new(TemplateProvider::new()),
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(config)?),
    };
    tracing::info!("Reasoning provider: {}", provider.name());
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("template".parse::<ProviderKind>().unwrap(), ProviderKind::Template);
        assert_eq!("Stub".parse::<ProviderKind>().unwrap(), ProviderKind::Template);
        assert_eq!(" openai ".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert!("anthropic".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_create_default_provider_is_template() {
        let provider = create_provider(&LlmConfig::default()).unwrap();
        assert_eq!(provider.name(), "template");
    }

    #[test]
    fn test_create_openai_without_key_fails() {
        let config = LlmConfig {
            provider: "openai".into(),
            ..Default::default()
        };
        assert!(create_provider(&config).is_err());
    }
}
