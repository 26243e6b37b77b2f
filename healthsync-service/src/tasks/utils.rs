use graph_flow::{Context, GraphError, NextAction, TaskResult};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{error, info, warn};

use crate::error::{AnalysisError, Result, StepFailure};
use crate::llm::CompletionBackend;
use crate::prompts::PromptTemplate;
use crate::structured::{StructuredOutput, parse_structured};

use super::session_keys;

/// Read `key` from the context, telling a missing key apart from a value of
/// the wrong shape.
pub async fn require<T: DeserializeOwned>(context: &Context, key: &str) -> Result<T> {
    let value: Value = context
        .get(key)
        .await
        .ok_or_else(|| AnalysisError::Context(format!("'{key}' not found in context")))?;

    serde_json::from_value(value)
        .map_err(|e| AnalysisError::Context(format!("'{key}' has an unexpected shape: {e}")))
}

/// Render `template`, ask the model, and parse the reply into `T`.
///
/// `{context}` and `{format_instructions}` are always provided; `extra_vars`
/// adds template-specific placeholders.
pub async fn run_structured<T: StructuredOutput>(
    backend: &dyn CompletionBackend,
    context: &Context,
    template: &PromptTemplate,
    extra_vars: &[(&str, &str)],
) -> Result<T> {
    let text: String = require(context, session_keys::EXTRACTED_TEXT).await?;
    let model: String = require(context, session_keys::MODEL).await?;

    let mut vars = vec![
        ("context", text.as_str()),
        ("format_instructions", T::format_instructions()),
    ];
    vars.extend_from_slice(extra_vars);
    let prompt = template.render(&vars);

    let response = backend.complete(&model, &prompt).await?;
    info!(kind = %T::KIND, model = %model, chars = response.len(), "Received model reply");

    let parsed = parse_structured::<T>(&response).inspect_err(|e| {
        warn!(kind = %T::KIND, reason = %e.reason, "Model reply failed schema validation");
    })?;
    Ok(parsed)
}

/// Record a finished step and hand control to the next one.
pub async fn complete_step(
    context: &Context,
    task_id: &str,
    status_message: String,
    next_action: NextAction,
) -> TaskResult {
    context
        .set(session_keys::step_status(task_id), status_message.clone())
        .await;
    TaskResult::new_with_status(None, next_action, Some(status_message))
}

/// Record why a step failed and turn the error into a `GraphError`.
pub async fn fail_step(context: &Context, task_id: &str, e: AnalysisError) -> GraphError {
    error!(task_id = %task_id, kind = e.kind(), error = %e, "Analysis step failed");

    let failure = StepFailure::from(&e);
    context
        .set(session_keys::step_failure(task_id), &failure)
        .await;

    match failure {
        StepFailure::Context(message) => GraphError::ContextError(message),
        _ => GraphError::TaskExecutionFailed(e.to_string()),
    }
}

pub const DEFAULT_AGE: u32 = 30;
pub const UNKNOWN_GENDER: &str = "Unknown";

static AGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:sex|gender)\s*/\s*age\s*[:\-]?\s*(?:male|female|m|f)\s*/\s*|age(?:\s*\((?:years?|yrs?|y)\))?(?:\s*/\s*(?:sex|gender))?\s*[:\-]?\s*)(\d{1,3})\b",
    )
    .expect("age pattern is valid")
});

static GENDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:sex|gender)\s*[:\-]\s*(male|female|m|f)\b|\bage\s*/\s*(?:sex|gender)\s*[:\-]?\s*\d{1,3}\s*(?:y(?:ears?|rs?)?)?\s*/\s*(male|female|m|f)\b|\b(?:sex|gender)\s*/\s*age\s*[:\-]?\s*(male|female|m|f)\b",
    )
    .expect("gender pattern is valid")
});

/// Age and gender as stated in the report, with neutral defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Demographics {
    pub age: u32,
    pub gender: String,
}

impl Demographics {
    pub fn from_text(text: &str) -> Self {
        let age = AGE_RE
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .filter(|age| *age <= 130)
            .unwrap_or(DEFAULT_AGE);

        let gender = GENDER_RE
            .captures(text)
            .and_then(|caps| caps.iter().skip(1).flatten().next())
            .map(|m| normalize_gender(m.as_str()))
            .unwrap_or_else(|| UNKNOWN_GENDER.to_string());

        Self { age, gender }
    }
}

fn normalize_gender(raw: &str) -> String {
    match raw.to_ascii_lowercase().as_str() {
        "m" | "male" => "Male".to_string(),
        "f" | "female" => "Female".to_string(),
        _ => UNKNOWN_GENDER.to_string(),
    }
}
