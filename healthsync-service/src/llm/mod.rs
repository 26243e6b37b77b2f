//! Text-to-structured-data capability.
//!
//! Tasks only see [`CompletionBackend`]; which hosted model answers is decided
//! once at startup by [`build_backend`].

mod agent;
mod http;

pub use agent::RigBackend;
pub use http::HttpBackend;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{Config, LlmProvider};
use crate::error::{AnalysisError, LlmError};
use crate::prompts::ChatPrompt;

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send one prompt to `model` and return the raw text of the reply.
    async fn complete(&self, model: &str, prompt: &ChatPrompt) -> Result<String, LlmError>;
}

/// Build the backend for the configured provider, or report the missing key.
pub fn build_backend(config: &Config) -> Result<Arc<dyn CompletionBackend>, AnalysisError> {
    let api_key = config
        .credential()
        .ok_or_else(|| AnalysisError::MissingCredential {
            provider: config.provider.name().to_string(),
            env_var: config.provider.credential_env_var(),
        })?;

    let backend: Arc<dyn CompletionBackend> = match config.provider {
        LlmProvider::OpenAi => Arc::new(RigBackend::openai(api_key, config.temperature)),
        LlmProvider::OpenRouter => Arc::new(RigBackend::openrouter(api_key, config.temperature)),
        LlmProvider::Compatible => {
            let base_url = config.base_url.as_deref().ok_or_else(|| {
                AnalysisError::Configuration(
                    "base_url is required for the compatible provider".to_string(),
                )
            })?;
            Arc::new(HttpBackend::new(base_url, api_key, config.temperature))
        }
    };

    Ok(backend)
}
