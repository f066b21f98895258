use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use agency_api::agents::{AnthropicClient, EventSink, Orchestrator, OrchestratorConfig};
use agency_api::api::{self, AppState};
use agency_api::config::AppConfig;
use agency_api::infrastructure::repositories::SqliteTaskStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration (reads .env first)
    let config = AppConfig::from_env()?;

    // Connect to database
    tracing::info!(url = %config.database_url, "Opening task store...");
    let store = Arc::new(SqliteTaskStore::connect(&config.database_url).await?);
    tracing::info!("Task store ready");

    let model = Arc::new(AnthropicClient::new(config.anthropic_settings()?));
    let mut orchestrator_config = OrchestratorConfig::new(&config.output_dir);
    orchestrator_config.history_window = config.history_window;
    let orchestrator = Arc::new(Orchestrator::new(
        orchestrator_config,
        store,
        model,
        EventSink::default(),
    ));

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = api::router(AppState::new(orchestrator))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);
    tracing::info!("WebSocket: ws://localhost:{}/ws", config.port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
