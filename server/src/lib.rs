use anyhow::Result;
use axum::{extract::{Query, State}, http::StatusCode, routing::get, Json, Router};
use search_core::persist::{load_engine, IndexPaths};
use search_core::{QueryEngine, QueryKind, SearchHit};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub mode: QueryKind,
    /// Lexicon score of the query text.
    pub sentiment: f64,
    pub terms: Vec<String>,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub document_count: usize,
    pub total_tokens: u64,
    pub avg_tokens: f64,
    pub total_sentiment: f64,
    pub avg_sentiment: f64,
    pub terms: usize,
}

/// Shared, read-only snapshot; handlers never mutate it.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QueryEngine>,
}

pub fn build_app(index_dir: String) -> Result<Router> {
    // Load the persisted snapshot and its tokenizer options once at startup
    let engine = load_engine(&IndexPaths::new(&index_dir))?;
    tracing::info!(
        index_dir = %index_dir,
        num_docs = engine.stats().document_count,
        num_terms = engine.index().len(),
        "snapshot loaded"
    );
    Ok(router(AppState { engine: Arc::new(engine) }))
}

pub fn router(app_state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/stats", get(stats_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let start = std::time::Instant::now();
    let mode = match params.mode.as_deref() {
        None => QueryKind::Or,
        Some(raw) => raw.parse::<QueryKind>().map_err(|e| (StatusCode::BAD_REQUEST, e))?,
    };

    let results = state.engine.execute(mode, &params.q);
    let total_hits = results.hits.len();
    let k = params.k.clamp(1, 100);
    let hits: Vec<SearchHit> = results.hits.into_iter().take(k).collect();

    let elapsed = start.elapsed();
    Ok(Json(SearchResponse {
        query: params.q,
        mode,
        sentiment: results.sentiment,
        terms: results.cleaned_terms,
        took_s: elapsed.as_secs_f64(),
        total_hits,
        results: hits,
    }))
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.engine.stats();
    Json(StatsResponse {
        document_count: stats.document_count,
        total_tokens: stats.total_tokens,
        avg_tokens: stats.avg_tokens,
        total_sentiment: stats.total_sentiment,
        avg_sentiment: stats.avg_sentiment,
        terms: state.engine.index().len(),
    })
}
