use async_trait::async_trait;
use rig::{
    client::CompletionClient,
    completion::Prompt,
    providers::{openai, openrouter},
};
use tracing::debug;

use super::CompletionBackend;
use crate::error::LlmError;
use crate::prompts::ChatPrompt;

enum ProviderClient {
    OpenAi(openai::Client),
    OpenRouter(openrouter::Client),
}

/// Hosted models reached through rig agents.
pub struct RigBackend {
    client: ProviderClient,
    temperature: f64,
}

impl RigBackend {
    pub fn openai(api_key: &str, temperature: f64) -> Self {
        Self {
            client: ProviderClient::OpenAi(openai::Client::new(api_key)),
            temperature,
        }
    }

    pub fn openrouter(api_key: &str, temperature: f64) -> Self {
        Self {
            client: ProviderClient::OpenRouter(openrouter::Client::new(api_key)),
            temperature,
        }
    }
}

#[async_trait]
impl CompletionBackend for RigBackend {
    async fn complete(&self, model: &str, prompt: &ChatPrompt) -> Result<String, LlmError> {
        debug!(model = %model, kind = %prompt.kind, "Prompting rig agent");

        let response = match &self.client {
            ProviderClient::OpenAi(client) => {
                let agent = client
                    .agent(model)
                    .preamble(&prompt.system)
                    .temperature(self.temperature)
                    .build();
                agent.prompt(&prompt.user).await
            }
            ProviderClient::OpenRouter(client) => {
                let agent = client
                    .agent(model)
                    .preamble(&prompt.system)
                    .temperature(self.temperature)
                    .build();
                agent.prompt(&prompt.user).await
            }
        };

        response.map_err(|e| LlmError::Request(e.to_string()))
    }
}
