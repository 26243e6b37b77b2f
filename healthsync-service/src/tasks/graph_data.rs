use async_trait::async_trait;
use graph_flow::{Context, NextAction, Result, Task, TaskResult};
use std::sync::Arc;
use tracing::info;

use super::{
    GRAPH_DATA_TASK, session_keys,
    utils::{complete_step, fail_step, run_structured},
};
use crate::llm::CompletionBackend;
use crate::models::GraphData;
use crate::prompts::GRAPH_DATA;

/// Picks the report date and a few chartable parameters. Last step of the flow.
pub struct GraphDataTask {
    backend: Arc<dyn CompletionBackend>,
}

impl GraphDataTask {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    async fn extract(&self, context: &Context) -> crate::Result<String> {
        let graph: GraphData =
            run_structured(self.backend.as_ref(), context, &GRAPH_DATA, &[]).await?;

        let names: Vec<&str> = graph.health_parameters.keys().map(String::as_str).collect();
        let status_message = format!(
            "Report date {}, parameters: {}",
            graph.report_date,
            names.join(", ")
        );
        info!(
            task_id = %self.id(),
            report_date = %graph.report_date,
            parameters = graph.health_parameters.len(),
            "Graph data extraction complete"
        );

        context.set(session_keys::GRAPH_DATA, &graph).await;
        Ok(status_message)
    }
}

#[async_trait]
impl Task for GraphDataTask {
    fn id(&self) -> &str {
        GRAPH_DATA_TASK
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        info!(task_id = %self.id(), "Starting graph data extraction");

        match self.extract(&context).await {
            Ok(status_message) => {
                Ok(complete_step(&context, self.id(), status_message, NextAction::End).await)
            }
            Err(e) => Err(fail_step(&context, self.id(), e).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AnalysisError, StepFailure};
    use crate::tasks::utils::require;
    use crate::test_support::{RAW_REPLY, SCORE_REPLY, ScriptedBackend};

    async fn context_with_text(text: &str) -> Context {
        let context = Context::new();
        context.set(session_keys::EXTRACTED_TEXT, text).await;
        context.set(session_keys::MODEL, "gpt-4o").await;
        context
    }

    #[tokio::test]
    async fn test_graph_data_stored() {
        let task = GraphDataTask::new(Arc::new(ScriptedBackend::well_behaved()));
        let context = context_with_text("Date: 15/03/2024\nHemoglobin: 13.5 g/dL").await;

        let result = task.run(context.clone()).await.unwrap();
        assert!(matches!(result.next_action, NextAction::End));
        assert_eq!(
            result.status_message.as_deref(),
            Some("Report date 2024-03-15, parameters: hemoglobin")
        );

        let graph: GraphData = require(&context, session_keys::GRAPH_DATA).await.unwrap();
        assert_eq!(graph.health_parameters["hemoglobin"], 13.5);
    }

    #[tokio::test]
    async fn test_non_numeric_parameter_is_rejected() {
        let backend = Arc::new(ScriptedBackend::new(
            RAW_REPLY,
            SCORE_REPLY,
            r#"{"reportDate": "2024-03-15", "healthParameters": {"sugar": "Nil"}}"#,
        ));
        let task = GraphDataTask::new(backend);
        let context = context_with_text("Sugar: Nil").await;

        assert!(task.run(context.clone()).await.is_err());

        let failure: StepFailure = require(&context, &session_keys::step_failure(GRAPH_DATA_TASK))
            .await
            .unwrap();
        assert!(matches!(
            AnalysisError::from(failure),
            AnalysisError::SchemaValidation(_)
        ));
    }
}
