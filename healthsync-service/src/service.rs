use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, Json},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{
    config::Config,
    error::AnalysisError,
    llm::{CompletionBackend, build_backend},
    models::{AnalysisReport, StatusResponse},
    workflow::{ReportAnalyzer, ReportUpload},
};

const INDEX_HTML: &str = include_str!("../static/index.html");

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "invalid_upload", "message": message })),
    )
}

fn analysis_error(e: AnalysisError) -> ApiError {
    let status = match &e {
        AnalysisError::MissingCredential { .. } => StatusCode::SERVICE_UNAVAILABLE,
        AnalysisError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
        AnalysisError::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AnalysisError::Llm(_) | AnalysisError::SchemaValidation(_) => StatusCode::BAD_GATEWAY,
        AnalysisError::Io(_)
        | AnalysisError::Configuration(_)
        | AnalysisError::Context(_)
        | AnalysisError::TaskExecutionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let mut body = json!({
        "error": e.kind(),
        "message": e.to_string(),
    });
    if let AnalysisError::SchemaValidation(invalid) = &e {
        body["step"] = json!(invalid.kind);
        body["raw_output"] = json!(invalid.raw_output);
    }

    (status, Json(body))
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// `None` while no API key is configured; the UI still loads.
    pub analyzer: Option<Arc<ReportAnalyzer>>,
    analysis_permits: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: Config, backend: Option<Arc<dyn CompletionBackend>>) -> Self {
        let analyzer = backend.map(|backend| {
            Arc::new(
                ReportAnalyzer::new(backend, config.execution_mode)
                    .with_upload_dir(config.upload_dir.clone()),
            )
        });
        let analysis_permits = Arc::new(Semaphore::new(config.max_concurrent_analyses));

        Self {
            config: Arc::new(config),
            analyzer,
            analysis_permits,
        }
    }

    fn missing_credential(&self) -> AnalysisError {
        AnalysisError::MissingCredential {
            provider: self.config.provider.name().to_string(),
            env_var: self.config.provider.credential_env_var(),
        }
    }
}

pub fn create_app(config: Config) -> Router {
    let backend = match build_backend(&config) {
        Ok(backend) => Some(backend),
        Err(e) => {
            warn!("Analysis disabled: {}", e);
            None
        }
    };
    build_router(AppState::new(config, backend))
}

pub fn build_router(app_state: AppState) -> Router {
    let max_upload_bytes = app_state.config.max_upload_bytes;

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/api/status", get(status))
        .route("/api/analyze", post(analyze))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(app_state)
}

async fn root() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let message = match state.analyzer {
        Some(_) => None,
        None => Some(state.missing_credential().to_string()),
    };

    Json(StatusResponse {
        analysis_enabled: state.analyzer.is_some(),
        provider: state.config.provider.name().to_string(),
        models: state.config.models(),
        default_model: state.config.default_model(),
        message,
    })
}

async fn analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<AnalysisReport> {
    let analyzer = state
        .analyzer
        .clone()
        .ok_or_else(|| analysis_error(state.missing_credential()))?;

    // Held before the body is buffered so waiting requests don't each pin an upload in memory.
    let _permit = state
        .analysis_permits
        .acquire()
        .await
        .map_err(|e| analysis_error(AnalysisError::TaskExecutionFailed(e.to_string())))?;

    let (upload, requested_model) = read_upload(multipart).await?;
    let model = resolve_model(&state.config, requested_model).map_err(analysis_error)?;

    info!(
        file_name = upload.file_name.as_deref().unwrap_or("<unnamed>"),
        bytes = upload.bytes.len(),
        model = %model,
        "Received report upload"
    );

    match analyzer.analyze_pdf(&upload, &model).await {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            error!(error = %e, kind = e.kind(), "Report analysis failed");
            Err(analysis_error(e))
        }
    }
}

async fn read_upload(mut multipart: Multipart) -> Result<(ReportUpload, Option<String>), ApiError> {
    let mut upload = None;
    let mut model = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            e.status(),
            Json(json!({ "error": "invalid_upload", "message": e.body_text() })),
        )
    })? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request_error(&e.body_text()))?;
                upload = Some(ReportUpload {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            Some("model") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| bad_request_error(&e.body_text()))?;
                let text = text.trim();
                if !text.is_empty() {
                    model = Some(text.to_string());
                }
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| bad_request_error("A PDF file is required in the 'file' field"))?;
    Ok((upload, model))
}

fn resolve_model(config: &Config, requested: Option<String>) -> Result<String, AnalysisError> {
    match requested {
        None => Ok(config.default_model()),
        Some(model) if config.models().contains(&model) => Ok(model),
        Some(model) => Err(AnalysisError::InvalidUpload(format!(
            "Unsupported model '{model}'. Choose one of: {}",
            config.models().join(", ")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::test_support::{GRAPH_REPLY, RAW_REPLY, ScriptedBackend, text_pdf};
    use axum_test::TestServer;
    use axum_test::multipart::{MultipartForm, Part};
    use std::time::Duration;

    fn test_config(upload_dir: &std::path::Path) -> Config {
        Config {
            upload_dir: Some(upload_dir.to_path_buf()),
            ..Config::default()
        }
    }

    fn server_with(backend: Option<Arc<ScriptedBackend>>, config: Config) -> TestServer {
        let backend = backend.map(|b| b as Arc<dyn CompletionBackend>);
        TestServer::new(build_router(AppState::new(config, backend))).unwrap()
    }

    fn pdf_form(bytes: Vec<u8>) -> MultipartForm {
        MultipartForm::new().add_part(
            "file",
            Part::bytes(bytes)
                .file_name("report.pdf")
                .mime_type("application/pdf"),
        )
    }

    #[tokio::test]
    async fn test_root_serves_ui() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_with(None, test_config(dir.path()));

        let response = server.get("/").await;
        response.assert_status_ok();
        assert!(response.text().contains("HealthSync"));
    }

    #[tokio::test]
    async fn test_health_check() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_with(None, test_config(dir.path()));

        let body: Value = server.get("/health").await.json();
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_status_without_credential() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_with(None, test_config(dir.path()));

        let body: StatusResponse = server.get("/api/status").await.json();
        assert!(!body.analysis_enabled);
        assert_eq!(body.default_model, "gpt-4o");
        assert!(body.message.unwrap().contains("OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn test_analyze_without_credential_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_with(None, test_config(dir.path()));

        let response = server
            .post("/api/analyze")
            .multipart(pdf_form(text_pdf(&["Hemoglobin: 13.5 g/dL"])))
            .await;

        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = response.json();
        assert_eq!(body["error"], "missing_credential");
    }

    #[tokio::test]
    async fn test_analyze_returns_three_results() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::well_behaved());
        let server = server_with(Some(backend.clone()), test_config(dir.path()));

        let form = pdf_form(text_pdf(&["Patient: Jane Doe", "Hemoglobin: 13.5 g/dL"]))
            .add_text("model", "gpt-4-turbo");
        let response = server.post("/api/analyze").multipart(form).await;

        response.assert_status_ok();
        let report: AnalysisReport = response.json();
        assert_eq!(report.model, "gpt-4-turbo");
        assert_eq!(report.document.file_name.as_deref(), Some("report.pdf"));
        assert_eq!(report.raw_extraction.data["hemoglobin"], 13.5);
        assert!((0.0..=100.0).contains(&report.health_score.score));
        assert_eq!(report.graph_data.health_parameters["hemoglobin"], 13.5);
        assert_eq!(report.downloads.health_score, "health_analysis_report.json");

        assert_eq!(backend.call_count(), 3);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_empty_upload_reports_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::well_behaved());
        let server = server_with(Some(backend.clone()), test_config(dir.path()));

        let response = server
            .post("/api/analyze")
            .multipart(pdf_form(Vec::new()))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = response.json();
        assert_eq!(body["error"], "extraction_error");
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_non_pdf_upload_reports_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_with(
            Some(Arc::new(ScriptedBackend::well_behaved())),
            test_config(dir.path()),
        );

        let form = MultipartForm::new().add_part(
            "file",
            Part::bytes(b"just some notes".to_vec())
                .file_name("notes.txt")
                .mime_type("text/plain"),
        );
        let response = server.post("/api/analyze").multipart(form).await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = response.json();
        assert!(body["message"].as_str().unwrap().contains("not a PDF"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_missing_file_field_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_with(
            Some(Arc::new(ScriptedBackend::well_behaved())),
            test_config(dir.path()),
        );

        let form = MultipartForm::new().add_text("model", "gpt-4o");
        let response = server.post("/api/analyze").multipart(form).await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unsupported_model_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::well_behaved());
        let server = server_with(Some(backend.clone()), test_config(dir.path()));

        let form = pdf_form(text_pdf(&["Hemoglobin: 13.5 g/dL"])).add_text("model", "gpt-2");
        let response = server.post("/api/analyze").multipart(form).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_model_reply_is_reported_with_raw_output() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new(
            RAW_REPLY,
            "The patient looks healthy overall.",
            GRAPH_REPLY,
        ));
        let server = server_with(Some(backend), test_config(dir.path()));

        let response = server
            .post("/api/analyze")
            .multipart(pdf_form(text_pdf(&["Hemoglobin: 13.5 g/dL"])))
            .await;

        response.assert_status(StatusCode::BAD_GATEWAY);
        let body: Value = response.json();
        assert_eq!(body["error"], "schema_validation_error");
        assert_eq!(body["step"], "health_score");
        assert_eq!(body["raw_output"], "The patient looks healthy overall.");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_model_endpoint_failure_is_bad_gateway() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::failing_with(LlmError::Status {
            status: 503,
            body: "upstream overloaded".to_string(),
        }));
        let server = server_with(Some(backend.clone()), test_config(dir.path()));

        let response = server
            .post("/api/analyze")
            .multipart(pdf_form(text_pdf(&["Hemoglobin: 13.5 g/dL"])))
            .await;

        response.assert_status(StatusCode::BAD_GATEWAY);
        let body: Value = response.json();
        assert_eq!(body["error"], "llm_error");
        assert!(body["message"].as_str().unwrap().contains("503"));
        assert!(body.get("raw_output").is_none());
        assert_eq!(backend.call_count(), 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_unwritable_upload_dir_is_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::well_behaved());
        let server = server_with(
            Some(backend.clone()),
            test_config(&dir.path().join("does-not-exist")),
        );

        let response = server
            .post("/api/analyze")
            .multipart(pdf_form(text_pdf(&["Hemoglobin: 13.5 g/dL"])))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert_eq!(body["error"], "io_error");
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_is_not_read_until_a_permit_is_free() {
        let dir = tempfile::tempdir().unwrap();
        let backend: Arc<dyn CompletionBackend> = Arc::new(ScriptedBackend::well_behaved());
        let state = AppState::new(test_config(dir.path()), Some(backend));
        let permits = state.analysis_permits.clone();
        let server = TestServer::new(build_router(state)).unwrap();

        // A form without a file is rejected as soon as the body is read.
        let held = permits.clone().acquire_owned().await.unwrap();
        let waiting = tokio::time::timeout(
            Duration::from_millis(200),
            server
                .post("/api/analyze")
                .multipart(MultipartForm::new().add_text("model", "gpt-4o")),
        )
        .await;
        assert!(waiting.is_err(), "request was handled while every permit was taken");

        drop(held);
        let response = server
            .post("/api/analyze")
            .multipart(MultipartForm::new().add_text("model", "gpt-4o"))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(permits.available_permits(), 1);
    }

    #[test]
    fn test_resolve_model() {
        let config = Config::default();
        assert_eq!(resolve_model(&config, None).unwrap(), "gpt-4o");
        assert_eq!(
            resolve_model(&config, Some("gpt-4-turbo".to_string())).unwrap(),
            "gpt-4-turbo"
        );
        assert!(resolve_model(&config, Some("davinci".to_string())).is_err());
    }
}
