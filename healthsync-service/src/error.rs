use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ExtractionKind;

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Everything that can abort an analysis request.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("No API key configured for provider '{provider}'. Set {env_var} in the environment or the secrets file.")]
    MissingCredential {
        provider: String,
        env_var: &'static str,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Failed to stage uploaded report: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    SchemaValidation(#[from] SchemaValidationError),

    #[error("Context error: {0}")]
    Context(String),

    #[error("Task execution failed: {0}")]
    TaskExecutionFailed(String),
}

impl AnalysisError {
    /// Stable machine-readable name used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::MissingCredential { .. } => "missing_credential",
            AnalysisError::Configuration(_) => "configuration_error",
            AnalysisError::InvalidUpload(_) => "invalid_upload",
            AnalysisError::Io(_) => "io_error",
            AnalysisError::Extraction(_) => "extraction_error",
            AnalysisError::Llm(_) => "llm_error",
            AnalysisError::SchemaValidation(_) => "schema_validation_error",
            AnalysisError::Context(_) | AnalysisError::TaskExecutionFailed(_) => "internal_error",
        }
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(e: serde_json::Error) -> Self {
        AnalysisError::Context(format!("value could not be serialized: {e}"))
    }
}

/// The PDF could not be turned into text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("The uploaded file is empty")]
    EmptyUpload,

    #[error("The uploaded file is not a PDF (first bytes: {magic:?})")]
    NotAPdf { magic: Vec<u8> },

    #[error("The PDF could not be read: {0}")]
    Unreadable(String),

    #[error("The PDF contains no extractable text (image-only or scanned documents are not supported)")]
    NoText,
}

/// The model endpoint could not be reached or refused the request.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Request(String),

    #[error("LLM API request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response format from LLM: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::Request(e.to_string())
    }
}

/// The model replied, but not with the declared shape.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("The {kind} response did not match its schema: {reason}")]
pub struct SchemaValidationError {
    pub kind: ExtractionKind,
    pub reason: String,
    pub raw_output: String,
}

/// A failed analysis step as recorded in the workflow context.
///
/// `graph_flow` tasks can only return a stringly `GraphError`, so each step
/// stores its typed failure next to its results before bailing out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepFailure {
    Llm(LlmError),
    SchemaValidation(SchemaValidationError),
    Context(String),
    Other(String),
}

impl From<&AnalysisError> for StepFailure {
    fn from(e: &AnalysisError) -> Self {
        match e {
            AnalysisError::Llm(e) => StepFailure::Llm(e.clone()),
            AnalysisError::SchemaValidation(e) => StepFailure::SchemaValidation(e.clone()),
            AnalysisError::Context(message) => StepFailure::Context(message.clone()),
            other => StepFailure::Other(other.to_string()),
        }
    }
}

impl From<StepFailure> for AnalysisError {
    fn from(failure: StepFailure) -> Self {
        match failure {
            StepFailure::Llm(e) => AnalysisError::Llm(e),
            StepFailure::SchemaValidation(e) => AnalysisError::SchemaValidation(e),
            StepFailure::Context(message) => AnalysisError::Context(message),
            StepFailure::Other(message) => AnalysisError::TaskExecutionFailed(message),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Figment(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError::Figment(Box::new(e))
    }
}
