//! Wayfind - tool-calling chat service
//!
//! Streams model answers to the client and lets the model browse the web or
//! generate UI components mid-conversation.

mod api;
mod config;
mod conversation;
mod llm;
mod orchestrator;
mod system_prompt;
#[cfg(test)]
mod testing;
mod tools;

use api::{create_router, AppState, Services};
use config::Config;
use llm::{GeminiService, LlmService, LoggingService};
use orchestrator::Orchestrator;
use std::net::SocketAddr;
use std::sync::Arc;
use tools::{HttpFetcher, ToolContext, ToolExecutor, ToolRegistry};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wayfind=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = Config::from_env();

    let state = if let Some(api_key) = config.google_api_key.clone() {
        let services = build_services(&config, api_key)?;
        tracing::info!(
            model = %config.model,
            turn_timeout_secs = config.turn_timeout.as_secs(),
            max_tool_rounds = config.max_tool_rounds,
            "Model configured"
        );
        AppState::new(services)
    } else {
        tracing::warn!("GOOGLE_API_KEY is not set; API requests will be rejected until it is");
        AppState::without_credentials()
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(compression);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Wayfind server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_services(config: &Config, api_key: String) -> Result<Services, Box<dyn std::error::Error>> {
    let gemini = GeminiService::new(
        api_key,
        config.model.clone(),
        config.gemini_base_url.as_deref(),
    )?;
    let llm: Arc<dyn LlmService> = Arc::new(LoggingService::new(Arc::new(gemini)));

    let tools = ToolContext::new(llm.clone(), Arc::new(HttpFetcher::new()?));
    let registry = Arc::new(ToolRegistry::standard()?);
    let executor = ToolExecutor::new(registry, tools.clone(), config.turn_timeout);
    let orchestrator = Orchestrator::new(llm, Arc::new(executor), config.orchestrator());

    Ok(Services {
        orchestrator,
        tools,
    })
}
