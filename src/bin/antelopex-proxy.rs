//! Lookup relay for the antelopex web frontend
//!
//! Browsers cannot reach every chain API or Hyperion node directly (CORS),
//! so the frontend posts lookups here and gets normalized entities back.
//!
//! ## Endpoints
//! - GET /health - Health check
//! - POST /api/lookup - `{ type, id, endpoint, hyperionEndpoint, code, table, ... }`
//!
//! ## Usage
//! ```bash
//! cargo run --bin antelopex-proxy --features proxy
//! ```

use std::sync::Arc;

use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use antelopex::{
    lookup::{self, LookupRequest},
    resolver::Resolver,
    source::HttpSource,
};

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    resolver: Arc<Resolver>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let timeout_ms = std::env::var("RPC_TIMEOUT_MS")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    let retries = std::env::var("RPC_RETRIES")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(2);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3030);

    log::info!("🦀 antelopex lookup relay");
    log::info!("RPC timeout: {}ms", timeout_ms);
    log::info!("RPC retries: {}", retries);
    log::info!("Port: {}", port);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let state = AppState {
        resolver: Arc::new(Resolver::new(Arc::new(HttpSource::new(timeout_ms, retries)))),
    };

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/api/lookup", post(lookup_handler))
        .layer(cors)
        .with_state(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("🚀 Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

/// One lookup per request. The body is parsed by hand so malformed JSON
/// answers with the same `{ "error": ... }` shape as every other failure.
async fn lookup_handler(State(state): State<AppState>, body: String) -> Response {
    let req: LookupRequest = match serde_json::from_str(&body) {
        Ok(req) => req,
        Err(e) => {
            log::warn!("Invalid JSON in lookup body: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("invalid request body: {e}") })),
            )
                .into_response();
        }
    };

    let res = lookup::handle(&state.resolver, &req).await;
    log::debug!("lookup {:?} -> {}", req.kind, res.status);
    let status = StatusCode::from_u16(res.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(res.body)).into_response()
}
