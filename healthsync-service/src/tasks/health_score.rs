use async_trait::async_trait;
use graph_flow::{Context, NextAction, Result, Task, TaskResult};
use std::sync::Arc;
use tracing::info;

use super::{
    HEALTH_SCORE_TASK, session_keys,
    utils::{Demographics, complete_step, fail_step, require, run_structured},
};
use crate::llm::CompletionBackend;
use crate::models::HealthScore;
use crate::prompts::HEALTH_SCORE;

/// Asks the model for a 0-100 score with a per-parameter breakdown.
pub struct HealthScoreTask {
    backend: Arc<dyn CompletionBackend>,
}

impl HealthScoreTask {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    async fn score(&self, context: &Context) -> crate::Result<String> {
        let text: String = require(context, session_keys::EXTRACTED_TEXT).await?;
        let demographics = Demographics::from_text(&text);
        let age = demographics.age.to_string();

        info!(
            task_id = %self.id(),
            age = demographics.age,
            gender = %demographics.gender,
            "Starting health score analysis"
        );

        let score: HealthScore = run_structured(
            self.backend.as_ref(),
            context,
            &HEALTH_SCORE,
            &[("age", age.as_str()), ("gender", demographics.gender.as_str())],
        )
        .await?;

        let status_message = format!(
            "Health score {} with {} parameters analysed",
            score.score,
            score.detailed_breakdown.len()
        );
        info!(task_id = %self.id(), score = score.score, "Health score analysis complete");

        context.set(session_keys::HEALTH_SCORE, score).await;
        Ok(status_message)
    }
}

#[async_trait]
impl Task for HealthScoreTask {
    fn id(&self) -> &str {
        HEALTH_SCORE_TASK
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        match self.score(&context).await {
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
