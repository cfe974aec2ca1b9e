//! HTTP server.
//!
//! Serves semantic search over the loaded index plus the administrative
//! reload/rebuild triggers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Liveness check (returns version) |
//! | `GET`  | `/api/v1/ping` | Readiness: whether the index and metadata are loaded |
//! | `GET`  | `/api/v1/search?q=&type=&top_k=` | Semantic search |
//! | `POST` | `/api/v1/admin/reindex` | Reload the artifacts from disk |
//! | `POST` | `/api/v1/admin/rebuild` | Rebuild the artifacts, then reload |
//! | `GET`  | `/api/v1/admin/status` | Store status |
//!
//! # Error Contract
//!
//! Request validation failures and admin failures use:
//!
//! ```json
//! { "error": { "code": "validation_error", "message": "top_k must be between 1 and 20" } }
//! ```
//!
//! Error codes: `validation_error` (422), `internal` (500).
//!
//! A search that cannot run (index not loaded, embedding failure) is not
//! an HTTP error: it answers 200 with `results: [{"error": "..."}]`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::artifacts::ArtifactPaths;
use crate::build::{build_index, BuildReport};
use crate::config::Config;
use crate::embedding;
use crate::search::{rank_for_display, SearchService, TypeFilter};
use crate::store::IndexStore;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    service: Arc<SearchService>,
    /// Serializes rebuilds; the builder is a single writer.
    rebuild_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(config: Arc<Config>, service: Arc<SearchService>) -> Self {
        Self {
            config,
            service,
            rebuild_lock: Arc::new(Mutex::new(())),
        }
    }

    fn store(&self) -> &IndexStore {
        self.service.store()
    }
}

/// Starts the HTTP server.
///
/// Loads the index once at startup; a failed load is logged and the server
/// still starts, reporting not-ready until a successful reindex.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let config = Arc::new(config.clone());

    let store = Arc::new(IndexStore::new(ArtifactPaths::from_config(&config.index)));
    if let Err(e) = store.load() {
        warn!(error = %e, "starting without a loaded index");
    }

    let provider = Arc::from(embedding::create_provider(&config.embedding)?);
    let service = Arc::new(SearchService::new(store, provider));
    let app = router(AppState::new(config, service));

    info!("listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the route table for `state`.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/v1/ping", get(handle_ping))
        .route("/api/v1/search", get(handle_search))
        .route("/api/v1/admin/reindex", post(handle_reindex))
        .route("/api/v1/admin/rebuild", post(handle_rebuild))
        .route("/api/v1/admin/status", get(handle_status))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn validation_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNPROCESSABLE_ENTITY,
        code: "validation_error".to_string(),
        message: message.into(),
    }
}

fn internal_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ Handlers ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct PingResponse {
    status: &'static str,
    index_loaded: bool,
    metadata_loaded: bool,
}

async fn handle_ping(State(state): State<AppState>) -> Json<PingResponse> {
    let status = state.store().status();
    let ready = status.loaded;
    Json(PingResponse {
        status: if ready { "ok" } else { "error" },
        index_loaded: state.store().snapshot().is_some(),
        metadata_loaded: status.chunk_count > 0,
    })
}

/// Raw query string; `top_k` is parsed by hand so bad values get a 422.
#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    top_k: Option<String>,
}

#[derive(Serialize)]
struct SearchResponse {
    query: String,
    results: Vec<serde_json::Value>,
    count: usize,
    filter: String,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    let query = params
        .q
        .ok_or_else(|| validation_error("missing required query parameter: q"))?;
    if query.trim().is_empty() {
        return Err(validation_error("Query string cannot be empty."));
    }

    let max_top_k = state.config.retrieval.max_top_k;
    let top_k = match params.top_k.as_deref() {
        None => state.config.retrieval.default_top_k,
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|k| (1..=max_top_k).contains(k))
            .ok_or_else(|| {
                validation_error(format!("top_k must be between 1 and {}", max_top_k))
            })?,
    };

    let filter = TypeFilter::parse_lenient(params.kind.as_deref());

    let results = match state.service.search(&query, top_k).await {
        Ok(hits) => rank_for_display(hits, filter)
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| internal_error(e.to_string()))?,
        Err(e) => {
            warn!(query = %query, error = %e, "search failed");
            vec![serde_json::json!({ "error": e.to_string() })]
        }
    };

    Ok(Json(SearchResponse {
        query,
        count: results.len(),
        results,
        filter: params.kind.unwrap_or_else(|| filter.as_str().to_string()),
    }))
}

#[derive(Serialize)]
struct ReindexResponse {
    status: &'static str,
    index_loaded: bool,
    metadata_loaded: bool,
    chunk_count: usize,
}

/// Reload the artifacts on the blocking pool and report the result.
async fn reindex(state: &AppState) -> Result<ReindexResponse, AppError> {
    let store = state.service.store().clone();
    let loaded = tokio::task::spawn_blocking(move || store.load())
        .await
        .map_err(|e| internal_error(format!("reload task failed: {}", e)))?;
    match loaded {
        Ok(count) => Ok(ReindexResponse {
            status: "ok",
            index_loaded: true,
            metadata_loaded: count > 0,
            chunk_count: count,
        }),
        Err(e) => Err(internal_error(format!("reload failed: {}", e))),
    }
}

async fn handle_reindex(State(state): State<AppState>) -> Result<Json<ReindexResponse>, AppError> {
    reindex(&state).await.map(Json)
}

#[derive(Serialize)]
struct RebuildResponse {
    build: BuildReport,
    #[serde(flatten)]
    load: ReindexResponse,
}

async fn handle_rebuild(State(state): State<AppState>) -> Result<Json<RebuildResponse>, AppError> {
    let _guard = state.rebuild_lock.lock().await;

    let build = build_index(&state.config, state.service.embedder().as_ref())
        .await
        .map_err(|e| {
            error!(error = %format!("{:#}", e), "rebuild failed");
            internal_error(format!("rebuild failed: {:#}", e))
        })?;

    let load = reindex(&state).await?;
    Ok(Json(RebuildResponse { build, load }))
}

#[derive(Serialize)]
struct StatusResponse {
    index_loaded: bool,
    metadata_count: usize,
    dims: usize,
}

async fn handle_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.store().status();
    Json(StatusResponse {
        index_loaded: status.loaded,
        metadata_count: status.chunk_count,
        dims: status.dims,
    })
}
