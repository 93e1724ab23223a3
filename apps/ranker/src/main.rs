mod config;
mod errors;
mod extraction;
mod llm_client;
mod ranking;
mod report;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resume Ranker v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone(), config.model.temperature)?;
    info!(
        "LLM client initialized (model: {}, timeout: {:?} x {} attempts)",
        llm_client::MODEL,
        config.model.attempt_timeout,
        config.model.max_attempts
    );
    info!(
        "Limits: {} bytes per upload, {} scoring call(s) in flight, default report format {}",
        config.limits.max_upload_bytes,
        config.model.scoring_concurrency,
        config.default_report_format
    );

    let port = config.port;
    let state = AppState::new(Arc::new(llm), config);

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the form is served from a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
