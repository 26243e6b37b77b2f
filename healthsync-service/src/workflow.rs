use graph_flow::{Context, Graph, GraphBuilder, GraphError, Session, Task};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ExecutionMode;
use crate::error::{AnalysisError, Result, StepFailure};
use crate::extract::extract_text;
use crate::llm::CompletionBackend;
use crate::models::{AnalysisReport, DocumentSummary, Downloads, StepStatus};
use crate::tasks::utils::require;
use crate::tasks::*;
use crate::upload::with_staged_pdf;

/// Sequential graphs chain the steps with edges; concurrent graphs leave them
/// unconnected so each step can be started on its own.
pub fn build_analysis_graph(backend: Arc<dyn CompletionBackend>, mode: ExecutionMode) -> Graph {
    let raw_extraction_task = Arc::new(RawExtractionTask::new(backend.clone()));
    let raw_extraction_id = raw_extraction_task.id().to_string();

    let health_score_task = Arc::new(HealthScoreTask::new(backend.clone()));
    let health_score_id = health_score_task.id().to_string();

    let graph_data_task = Arc::new(GraphDataTask::new(backend));
    let graph_data_id = graph_data_task.id().to_string();

    let builder = GraphBuilder::new("report_analysis")
        .add_task(raw_extraction_task)
        .add_task(health_score_task)
        .add_task(graph_data_task);

    match mode {
        ExecutionMode::Sequential => builder
            .add_edge(&raw_extraction_id, &health_score_id)
            .add_edge(&health_score_id, &graph_data_id)
            .build(),
        ExecutionMode::Concurrent => builder.build(),
    }
}

/// One uploaded report as received from the client.
#[derive(Debug, Clone)]
pub struct ReportUpload {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

/// Upload -> text -> three model calls.
pub struct ReportAnalyzer {
    graph: Arc<Graph>,
    mode: ExecutionMode,
    upload_dir: Option<PathBuf>,
}

impl ReportAnalyzer {
    pub fn new(backend: Arc<dyn CompletionBackend>, mode: ExecutionMode) -> Self {
        Self {
            graph: Arc::new(build_analysis_graph(backend, mode)),
            mode,
            upload_dir: None,
        }
    }

    pub fn with_upload_dir(mut self, upload_dir: Option<PathBuf>) -> Self {
        self.upload_dir = upload_dir;
        self
    }

    pub async fn analyze_pdf(&self, upload: &ReportUpload, model: &str) -> Result<AnalysisReport> {
        let text = with_staged_pdf(&upload.bytes, self.upload_dir.as_deref(), |path| async move {
            extract_text(&path).await
        })
        .await?;

        let document = DocumentSummary {
            file_name: upload.file_name.clone(),
            size_bytes: upload.bytes.len(),
            text_chars: text.chars().count(),
        };
        self.analyze_text(document, text, model).await
    }

    pub async fn analyze_text(
        &self,
        document: DocumentSummary,
        text: String,
        model: &str,
    ) -> Result<AnalysisReport> {
        let analysis_id = Uuid::new_v4();
        info!(
            analysis_id = %analysis_id,
            model = %model,
            text_chars = document.text_chars,
            mode = ?self.mode,
            "Starting report analysis"
        );

        let context = Context::new();
        context.set(session_keys::EXTRACTED_TEXT, text).await;
        context.set(session_keys::MODEL, model).await;

        match self.mode {
            ExecutionMode::Sequential => self.run_sequential(analysis_id, &context).await?,
            ExecutionMode::Concurrent => self.run_concurrent(analysis_id, &context).await?,
        }

        let mut steps = Vec::with_capacity(ANALYSIS_TASKS.len());
        for task_id in ANALYSIS_TASKS {
            steps.push(StepStatus {
                task_id: task_id.to_string(),
                status_message: context.get(&session_keys::step_status(task_id)).await,
            });
        }

        let report = AnalysisReport {
            analysis_id,
            model: model.to_string(),
            document,
            raw_extraction: require(&context, session_keys::RAW_EXTRACTION).await?,
            health_score: require(&context, session_keys::HEALTH_SCORE).await?,
            graph_data: require(&context, session_keys::GRAPH_DATA).await?,
            steps,
            downloads: Downloads::default(),
        };

        info!(
            analysis_id = %analysis_id,
            score = report.health_score.score,
            "Report analysis complete"
        );
        Ok(report)
    }

    /// Walk the edges from the first step; the first failure ends the run.
    async fn run_sequential(&self, analysis_id: Uuid, context: &Context) -> Result<()> {
        let mut session = Session::new_from_task(analysis_id.to_string(), RAW_EXTRACTION_TASK);
        session.context = context.clone();

        match self.graph.execute_session(&mut session).await {
            Ok(result) => {
                debug!(analysis_id = %analysis_id, status = ?result.status, "Analysis graph finished");
                Ok(())
            }
            Err(e) => Err(step_error(context, &ANALYSIS_TASKS, e).await),
        }
    }

    /// Start every step in its own session over the shared context.
    async fn run_concurrent(&self, analysis_id: Uuid, context: &Context) -> Result<()> {
        let mut join_set = JoinSet::new();
        for task_id in ANALYSIS_TASKS {
            let graph = Arc::clone(&self.graph);
            let mut session = Session::new_from_task(format!("{analysis_id}-{task_id}"), task_id);
            session.context = context.clone();
            join_set.spawn(async move { (task_id, graph.execute_session(&mut session).await) });
        }

        while let Some(joined) = join_set.join_next().await {
            let (task_id, outcome) =
                joined.map_err(|e| AnalysisError::TaskExecutionFailed(e.to_string()))?;
            if let Err(e) = outcome {
                join_set.abort_all();
                return Err(step_error(context, &[task_id], e).await);
            }
        }
        Ok(())
    }
}

/// Recover the typed failure a step recorded before returning `e`.
async fn step_error(context: &Context, task_ids: &[&str], e: GraphError) -> AnalysisError {
    for task_id in task_ids {
        if let Some(failure) = context
            .get::<StepFailure>(&session_keys::step_failure(task_id))
            .await
        {
            return failure.into();
        }
    }
    AnalysisError::TaskExecutionFailed(e.to_string())
}
