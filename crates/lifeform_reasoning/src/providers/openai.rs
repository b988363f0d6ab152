use crate::llm::ReasoningProvider;
use crate::prompts::{clean_generated_text, PromptBuilder, SYSTEM_PROMPT};
use crate::retry::{with_retry, RetryConfig};
use anyhow::{Context, Result};
use lifeform_core::config::LlmConfig;
use lifeform_core::{LifeformState, Memory, Question, Reflection};
use reqwest::Client;
use serde_json::{json, Value};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible chat completions provider.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    retry: RetryConfig,
}

impl OpenAiProvider {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .context("OpenAI provider selected but no API key configured")?;
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client: Client::builder()
                .timeout(config.timeout())
                .build()
                .context("Failed to build HTTP client")?,
            api_key,
            base_url,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            // Transport-level retries for one request; the engine's timeout
            // bounds all attempts together.
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn payload(&self, user_prompt: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_prompt },
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }

    async fn complete(&self, user_prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let payload = self.payload(user_prompt);
        let (client, api_key, url, payload) = (&self.client, &self.api_key, &url, &payload);

        let response = with_retry(&self.retry, "OpenAI", || async move {
            client
                .post(url.as_str())
                .bearer_auth(api_key)
                .json(payload)
                .send()
                .await
                .context("Failed to send request to OpenAI")
        })
        .await?;

        let body: Value = response
            .json()
            .await
            .context("Failed to decode OpenAI response")?;
        extract_message_text(&body)
    }
}

/// Pull `choices[0].message.content` out of a chat completion body.
fn extract_message_text(body: &Value) -> Result<String> {
    let content = body["choices"][0]["message"]["content"]
        .as_str()
        .context("OpenAI response had no message content")?;
    let text = clean_generated_text(content);
    if text.is_empty() {
        anyhow::bail!("OpenAI returned empty text");
    }
    Ok(text)
}

#[async_trait::async_trait]
impl ReasoningProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn propose_question(
        &self,
        state: &LifeformState,
        last_reflection: Option<&Reflection>,
    ) -> Result<String> {
        self.complete(&PromptBuilder::question_prompt(state, last_reflection))
            .await
    }

    async fn generate_reflection(
        &self,
        question: &Question,
        memory: &Memory,
        state: &LifeformState,
    ) -> Result<String> {
        self.complete(&PromptBuilder::reflection_prompt(question, memory, state))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_key(key: Option<&str>) -> LlmConfig {
        LlmConfig {
            provider: "openai".into(),
            api_key: key.map(String::from),
            base_url: Some("http://localhost:9/v1/".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_requires_api_key() {
        assert!(OpenAiProvider::new(&config_with_key(None)).is_err());
        assert!(OpenAiProvider::new(&config_with_key(Some(""))).is_err());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let provider = OpenAiProvider::new(&config_with_key(Some("sk-test"))).unwrap();
        assert_eq!(provider.base_url, "http://localhost:9/v1");
    }

    #[test]
    fn test_payload_shape() {
        let provider = OpenAiProvider::new(&config_with_key(Some("sk-test"))).unwrap();
        let payload = provider.payload("ask something");
        assert_eq!(payload["model"], "gpt-4o-mini");
        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][1]["content"], "ask something");
    }

    #[test]
    fn test_extract_message_text() {
        let body = json!({
            "choices": [{ "message": { "role": "assistant", "content": "  \"What calms you?\"  " } }]
        });
        assert_eq!(extract_message_text(&body).unwrap(), "What calms you?");

        let empty = json!({ "choices": [{ "message": { "content": "   " } }] });
        assert!(extract_message_text(&empty).is_err());

        let missing = json!({ "error": { "message": "bad key" } });
        assert!(extract_message_text(&missing).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_backend_errors() {
        // Port 9 (discard) is not listening; the request fails fast
        let provider = OpenAiProvider::new(&config_with_key(Some("sk-test")))
            .unwrap()
            .with_retry(RetryConfig::none());
        let result = provider
            .propose_question(&LifeformState::default(), None)
            .await;
        assert!(result.is_err());
    }
}
