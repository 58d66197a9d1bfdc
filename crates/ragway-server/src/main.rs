//! Ragway — multi-provider streaming chat gateway.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use ragway_core::GatewayConfig;
use ragway_server::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--help" | "-h" | "help" => {
                println!("Ragway — streaming chat gateway for Gemini and OpenAI");
                println!();
                println!("Usage: ragway");
                println!();
                println!("Environment:");
                println!("  PORT                          Listen port (default 3003)");
                println!("  RAGWAY_OPENAI_BASE_URL        OpenAI API root");
                println!("  RAGWAY_GEMINI_BASE_URL        Gemini API root");
                println!("  RAGWAY_DEFAULT_GEMINI_MODEL   Model when a request names none");
                println!("  RAGWAY_DEFAULT_OPENAI_MODEL   Model when a request names none");
                println!("  RAGWAY_INGEST_POLL_MS         Ingestion status poll interval");
                println!("  RAGWAY_INGEST_MAX_ATTEMPTS    Ingestion status poll limit");
                println!("  RAGWAY_INGEST_TIMEOUT_SECS    Ingestion deadline");
                println!("  RUST_LOG                      Log filter (default info)");
                return Ok(());
            }
            other => {
                eprintln!("Unknown argument: {}. Use 'ragway help' for usage.", other);
                std::process::exit(1);
            }
        }
    }

    let config = GatewayConfig::from_env()?;
    let port = config.port;
    info!(
        "Default models: gemini={} openai={}",
        config.default_gemini_model, config.default_openai_model
    );

    let http = reqwest::Client::builder()
        .user_agent(concat!("ragway/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let state = Arc::new(AppState::new(config, http));

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Ragway listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
