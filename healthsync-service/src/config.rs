//! Service configuration.
//!
//! Values are layered, later sources overriding earlier ones:
//!
//! 1. built-in defaults
//! 2. the TOML secrets file (`HEALTHSYNC_SECRETS_FILE`, default `secrets.toml`)
//! 3. `HEALTHSYNC_*` environment variables (e.g. `HEALTHSYNC_PROVIDER=openrouter`)
//! 4. the conventional `OPENAI_API_KEY`, `OPENROUTER_API_KEY` and `PORT` variables
//!
//! ```toml
//! # secrets.toml
//! openai_api_key = "sk-..."
//! default_model = "gpt-4o"
//! ```

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const DEFAULT_SECRETS_FILE: &str = "secrets.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAi,
    OpenRouter,
    /// Any endpoint speaking the OpenAI chat-completions protocol.
    Compatible,
}

impl LlmProvider {
    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "openai",
            LlmProvider::OpenRouter => "openrouter",
            LlmProvider::Compatible => "compatible",
        }
    }

    pub fn credential_env_var(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "OPENAI_API_KEY",
            LlmProvider::OpenRouter => "OPENROUTER_API_KEY",
            LlmProvider::Compatible => "HEALTHSYNC_API_KEY",
        }
    }

    fn default_models(&self) -> Vec<String> {
        let models: &[&str] = match self {
            LlmProvider::OpenAi | LlmProvider::Compatible => &["gpt-4o", "gpt-4-turbo"],
            LlmProvider::OpenRouter => &["openai/gpt-4o", "openai/gpt-4-turbo"],
        };
        models.iter().map(|m| m.to_string()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One LLM call after another, stopping at the first failure.
    #[default]
    Sequential,
    /// All LLM calls in flight at once.
    Concurrent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub provider: LlmProvider,
    /// Explicit key; wins over the provider-specific variables below.
    pub api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    /// Base URL of a `compatible` endpoint, e.g. `http://localhost:11434/v1`.
    pub base_url: Option<String>,
    /// Defaults to the first entry of `models`.
    pub default_model: Option<String>,
    /// Models offered in the UI. Defaults depend on the provider.
    pub models: Option<Vec<String>>,
    pub temperature: f64,
    pub execution_mode: ExecutionMode,
    pub max_upload_bytes: usize,
    pub max_concurrent_analyses: usize,
    /// Directory for staged uploads. Defaults to the system temp dir.
    pub upload_dir: Option<PathBuf>,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            provider: LlmProvider::default(),
            api_key: None,
            openai_api_key: None,
            openrouter_api_key: None,
            base_url: None,
            default_model: None,
            models: None,
            temperature: 0.7,
            execution_mode: ExecutionMode::default(),
            max_upload_bytes: 20 * 1024 * 1024,
            max_concurrent_analyses: 1,
            upload_dir: None,
            log_json: false,
        }
    }
}

impl Config {
    pub fn load(secrets_file: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(secrets_file).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn figment(secrets_file: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(secrets_file.as_ref()))
            .merge(Env::prefixed("HEALTHSYNC_"))
            .merge(Env::raw().only(&["OPENAI_API_KEY", "OPENROUTER_API_KEY", "PORT"]))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider == LlmProvider::Compatible && self.base_url.is_none() {
            return Err(ConfigError::Invalid(
                "provider 'compatible' requires base_url".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be within 0..=2, got {}",
                self.temperature
            )));
        }
        if self.max_upload_bytes == 0 || self.max_concurrent_analyses == 0 {
            return Err(ConfigError::Invalid(
                "max_upload_bytes and max_concurrent_analyses must be greater than zero"
                    .to_string(),
            ));
        }
        let models = self.models();
        if models.is_empty() {
            return Err(ConfigError::Invalid("models must not be empty".to_string()));
        }
        if let Some(default_model) = &self.default_model {
            if !models.contains(default_model) {
                return Err(ConfigError::Invalid(format!(
                    "default_model '{default_model}' is not one of the configured models"
                )));
            }
        }
        Ok(())
    }

    pub fn models(&self) -> Vec<String> {
        self.models
            .clone()
            .unwrap_or_else(|| self.provider.default_models())
    }

    pub fn default_model(&self) -> String {
        self.default_model
            .clone()
            .or_else(|| self.models().into_iter().next())
            .unwrap_or_default()
    }

    /// The API key for the selected provider, if one is configured.
    pub fn credential(&self) -> Option<&str> {
        let provider_key = match self.provider {
            LlmProvider::OpenAi => self.openai_api_key.as_deref(),
            LlmProvider::OpenRouter => self.openrouter_api_key.as_deref(),
            LlmProvider::Compatible => None,
        };
        self.api_key
            .as_deref()
            .or(provider_key)
            .filter(|key| !key.trim().is_empty())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
