use anyhow::{Context, Result};
use healthsync_service::{
    Config, DEFAULT_SECRETS_FILE, ReportAnalyzer, ReportUpload, build_backend,
};
use std::env;
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter("info").init();

    println!("HealthSync PDF -> text -> analysis");
    println!("==================================");

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <pdf_file_path> [model]", args[0]);
        eprintln!("Example: {} /path/to/lab_report.pdf gpt-4o", args[0]);
        std::process::exit(1);
    }
    let pdf_path = Path::new(&args[1]);

    let secrets_file =
        env::var("HEALTHSYNC_SECRETS_FILE").unwrap_or_else(|_| DEFAULT_SECRETS_FILE.to_string());
    let config = Config::load(&secrets_file)?;
    let model = args.get(2).cloned().unwrap_or_else(|| config.default_model());

    let backend = match build_backend(&config) {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("{e}");
            eprintln!(
                "Example: export {}='your_key_here'",
                config.provider.credential_env_var()
            );
            std::process::exit(1);
        }
    };

    let bytes = tokio::fs::read(pdf_path)
        .await
        .with_context(|| format!("reading {}", pdf_path.display()))?;
    let upload = ReportUpload {
        file_name: pdf_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned()),
        bytes,
    };

    println!("Processing PDF: {}", pdf_path.display());
    println!("Provider: {}, model: {}", config.provider.name(), model);
    println!();

    let analyzer = ReportAnalyzer::new(backend, config.execution_mode)
        .with_upload_dir(config.upload_dir.clone());
    let report = match analyzer.analyze_pdf(&upload, &model).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Analysis failed ({}): {}", e.kind(), e);
            std::process::exit(1);
        }
    };

    println!("Extracted {} characters of text", report.document.text_chars);
    for step in &report.steps {
        println!(
            "   - {}: {}",
            step.task_id,
            step.status_message.as_deref().unwrap_or("done")
        );
    }
    println!();

    println!("{}:", report.downloads.raw_extraction);
    println!("{}", serde_json::to_string_pretty(&report.raw_extraction)?);
    println!();
    println!("{}:", report.downloads.health_score);
    println!("{}", serde_json::to_string_pretty(&report.health_score)?);
    println!();
    println!("{}:", report.downloads.graph_data);
    println!("{}", serde_json::to_string_pretty(&report.graph_data)?);

    Ok(())
}
