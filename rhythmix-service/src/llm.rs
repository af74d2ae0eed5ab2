use async_trait::async_trait;
use rig::{client::CompletionClient, completion::Chat, providers::openrouter};
use tracing::debug;

/// Text-in, text-out access to a language model
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, preamble: &str, prompt: &str) -> anyhow::Result<String>;
}

/// LanguageModel backed by OpenRouter through rig
pub struct OpenRouterModel {
    client: openrouter::Client,
    model: String,
}

impl OpenRouterModel {
    pub fn new(api_key: &str, model: impl Into<String>) -> Self {
        Self {
            client: openrouter::Client::new(api_key),
            model: model.into(),
        }
    }
}

#[async_trait]
impl LanguageModel for OpenRouterModel {
    async fn complete(&self, preamble: &str, prompt: &str) -> anyhow::Result<String> {
        debug!(model = %self.model, prompt_len = prompt.len(), "Calling language model");
        let agent = self
            .client
            .agent(&self.model)
            .preamble(preamble)
            .temperature(0.0)
            .build();

        let response = agent
            .chat(prompt, vec![])
            .await
            .map_err(|e| anyhow::anyhow!("LLM chat failed: {}", e))?;
        Ok(response)
    }
}
