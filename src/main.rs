use std::sync::Arc;

use tracing_subscriber::EnvFilter;

mod apis;
mod config;
mod news;
mod rate_limit;
mod routes;
mod search;

use config::Config;
use news::NewsClient;
use rate_limit::SourceLimiters;
use routes::AppState;
use search::Aggregator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .init();

    let config = Config::from_env();
    let sources = config.build_sources();
    let limiters = SourceLimiters::new(config.semantic_scholar_key.is_some());

    tracing::info!(
        "Initialized {} paper sources (Google Scholar backup {})",
        sources.len(),
        if config.serpapi_configured() { "configured" } else { "not configured" }
    );

    let state = AppState {
        aggregator: Arc::new(Aggregator::new(
            sources,
            Arc::new(limiters),
            config.request_timeout,
        )),
        news: Arc::new(NewsClient::new(config.request_timeout)),
        config: Arc::new(config),
    };

    let addr = state.config.bind_addr;
    let app = routes::create_router(state);

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
