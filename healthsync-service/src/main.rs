use healthsync_service::{Config, DEFAULT_SECRETS_FILE, create_app};
use tokio::net::TcpListener;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let secrets_file = std::env::var("HEALTHSYNC_SECRETS_FILE")
        .unwrap_or_else(|_| DEFAULT_SECRETS_FILE.to_string());
    let config = Config::load(&secrets_file)?;

    let env_filter = EnvFilter::from_default_env().add_directive(Level::INFO.into());
    if config.log_json {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(env_filter)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder().with_env_filter(env_filter).finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    let bind_address = config.bind_address();
    info!(
        provider = config.provider.name(),
        default_model = %config.default_model(),
        mode = ?config.execution_mode,
        "Configuration loaded"
    );

    let app = create_app(config);
    let listener = TcpListener::bind(&bind_address).await?;
    let addr = listener.local_addr()?;

    info!("HealthSync starting on {}", addr);
    info!("Upload page: http://{}/", addr);
    info!("Health check endpoint: http://{}/health", addr);
    info!("Analysis endpoint: POST http://{}/api/analyze", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
