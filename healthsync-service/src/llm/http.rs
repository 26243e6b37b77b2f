use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use super::CompletionBackend;
use crate::error::LlmError;
use crate::prompts::ChatPrompt;

/// Any endpoint that speaks the OpenAI chat-completions protocol.
pub struct HttpBackend {
    client: Client,
    endpoint: String,
    api_key: String,
    temperature: f64,
}

impl HttpBackend {
    pub fn new(base_url: &str, api_key: &str, temperature: f64) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            temperature,
        }
    }
}

#[async_trait]
impl CompletionBackend for HttpBackend {
    async fn complete(&self, model: &str, prompt: &ChatPrompt) -> Result<String, LlmError> {
        let payload = json!({
            "model": model,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user }
            ]
        });

        debug!(endpoint = %self.endpoint, model = %model, kind = %prompt.kind, "Posting chat completion");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let response_json: Value = response.json().await?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                LlmError::InvalidResponse("missing choices[0].message.content".to_string())
            })?;

        Ok(content.to_string())
    }
}
