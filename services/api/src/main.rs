mod config;
mod routes;

use crate::config::{Config, Provider};
use crate::routes::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::fmt::time::ChronoLocal;
use viva_core::orchestrator::{ChatProvider, GeminiChat, OpenAiChat, Orchestrator};
use viva_core::service::InterviewService;
use viva_core::store::MemoryStore;

/// Builds the inference ladder from the configured keys: the selected
/// provider is the primary rung, the other becomes the secondary rung
/// when its key is present.
fn build_orchestrator(config: &Config) -> Result<Orchestrator> {
    let openai = config.openai_api_key.clone().map(|key| {
        Arc::new(OpenAiChat::new(key, config.chat_model.clone())) as Arc<dyn ChatProvider>
    });
    let gemini = config.gemini_api_key.clone().map(|key| {
        Arc::new(GeminiChat::new(key, config.gemini_model.clone())) as Arc<dyn ChatProvider>
    });

    let (primary, secondary) = match config.provider {
        Provider::OpenAI => (openai, gemini),
        Provider::Gemini => (gemini, openai),
    };
    let primary = primary.context("primary provider key missing")?;

    let mut orchestrator = Orchestrator::new(primary);
    if let Some(secondary) = secondary {
        orchestrator = orchestrator.with_secondary(secondary);
    }
    Ok(orchestrator)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load application configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let orchestrator = build_orchestrator(&config)?;
    let service = InterviewService::new(orchestrator, MemoryStore::new());
    let state = Arc::new(AppState { service });

    // Permissive CORS so a separate frontend can reach the API.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::router(state).layer(cors);

    tracing::info!("Starting interview API, listening on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
