//! HTTP surface: thin JSON handlers over the aggregator and news feed.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::apis::{PaperRecord, SourceId, YearFilter};
use crate::config::{Config, SourceStatus};
use crate::news::{NewsClient, NewsItem};
use crate::search::{Aggregator, SearchQuery};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub aggregator: Arc<Aggregator>,
    pub news: Arc<NewsClient>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/search", get(search))
        .route("/api/sources", get(list_sources))
        .route("/api/health", get(health))
        .route("/api/news", get(news))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
    year: Option<String>,
    sources: Option<String>,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    success: bool,
    count: usize,
    results: Vec<PaperRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sources_used: Vec<SourceId>,
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<SearchResponse> {
    let query = SearchQuery {
        query: params.q,
        year: YearFilter::parse(params.year.as_deref().unwrap_or("all")),
        sources: params.sources.as_deref().and_then(SourceId::parse_list),
    };

    let outcome = state.aggregator.aggregate(&query).await;
    tracing::info!(
        "Search {:?} returned {} results",
        query.query,
        outcome.records.len()
    );
    Json(SearchResponse {
        success: true,
        count: outcome.records.len(),
        results: outcome.records,
        sources_used: outcome.sources_used,
    })
}

#[derive(Debug, Serialize)]
struct SourcesResponse {
    available_sources: Vec<SourceStatus>,
}

async fn list_sources(State(state): State<AppState>) -> Json<SourcesResponse> {
    Json(SourcesResponse {
        available_sources: state.config.source_status(),
    })
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let serpapi_status = if state.config.serpapi_configured() {
        "configured"
    } else {
        "not configured"
    };
    Json(json!({
        "status": "ok",
        "message": "Electric Motor Multi-Source Research Backend",
        "free_sources": state.config.free_source_names(),
        "serpapi_status": serpapi_status,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[derive(Debug, Serialize)]
struct NewsResponse {
    success: bool,
    count: usize,
    news: Vec<NewsItem>,
}

async fn news(State(state): State<AppState>) -> Json<NewsResponse> {
    let news = state.news.latest_or_fallback().await;
    Json(NewsResponse {
        success: true,
        count: news.len(),
        news,
    })
}

async fn index() -> Json<Value> {
    Json(json!({
        "message": "Electric Motor Research Search API",
        "version": env!("CARGO_PKG_VERSION"),
        "sources": {
            "free": [
                "Semantic Scholar (10,000/month)",
                "arXiv (unlimited)",
                "CORE (1,000/day)",
                "CrossRef (unlimited)"
            ],
            "backup": ["Google Scholar via SerpAPI (100/month)"]
        },
        "endpoints": {
            "health": "/api/health",
            "search": "/api/search?q=motor&year=2024&sources=arxiv,crossref",
            "news": "/api/news",
            "sources": "/api/sources"
        }
    }))
}
