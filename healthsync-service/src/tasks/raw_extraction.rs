use async_trait::async_trait;
use graph_flow::{Context, NextAction, Result, Task, TaskResult};
use std::sync::Arc;
use tracing::info;

use super::{
    RAW_EXTRACTION_TASK, session_keys,
    utils::{complete_step, fail_step, run_structured},
};
use crate::llm::CompletionBackend;
use crate::models::RawExtraction;
use crate::prompts::RAW_EXTRACTION;

/// Converts the report text into a flat JSON object of everything it states.
pub struct RawExtractionTask {
    backend: Arc<dyn CompletionBackend>,
}

impl RawExtractionTask {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    async fn extract(&self, context: &Context) -> crate::Result<String> {
        let raw: RawExtraction =
            run_structured(self.backend.as_ref(), context, &RAW_EXTRACTION, &[]).await?;
        let fields = raw.data.len();

        context.set(session_keys::RAW_EXTRACTION, raw).await;

        info!(task_id = %self.id(), fields, "Raw data extraction complete");
        Ok(format!("Extracted {fields} fields from the report"))
    }
}

#[async_trait]
impl Task for RawExtractionTask {
    fn id(&self) -> &str {
        RAW_EXTRACTION_TASK
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        info!(task_id = %self.id(), "Starting raw data extraction");

        match self.extract(&context).await {
            Ok(status_message) => Ok(complete_step(
                &context,
                self.id(),
                status_message,
                NextAction::ContinueAndExecute,
            )
            .await),
            Err(e) => Err(fail_step(&context, self.id(), e).await),
        }
    }
}
