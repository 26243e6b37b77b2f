pub mod config;
pub mod error;
pub mod extract;
pub mod llm;
pub mod models;
pub mod prompts;
pub mod service;
pub mod structured;
pub mod tasks;
pub mod upload;
pub mod workflow;

#[cfg(test)]
mod test_support;

pub use config::{Config, DEFAULT_SECRETS_FILE, ExecutionMode, LlmProvider};
pub use error::{AnalysisError, Result};
pub use llm::{CompletionBackend, build_backend};
pub use models::*;
pub use service::{AppState, build_router, create_app};
pub use workflow::{ReportAnalyzer, ReportUpload, build_analysis_graph};
