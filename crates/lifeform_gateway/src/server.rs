use crate::types::{ApiError, ReplyRequest};
use anyhow::Context;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lifeform_core::StateSnapshot;
use lifeform_reasoning::MetabolismEngine;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Shared state for the HTTP handlers.
#[derive(Clone)]
struct AppState {
    engine: Arc<MetabolismEngine>,
}

/// Build the request surface:
/// - `GET /health`: liveness check
/// - `GET /api/state`: current snapshot, lining up a question if none is pending
/// - `POST /api/reply`: answer the pending question
/// - `POST /api/admin/seed`: force a fresh pending question
pub fn app_router(engine: Arc<MetabolismEngine>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/state", get(read_state))
        .route("/api/reply", post(submit_reply))
        .route("/api/admin/seed", post(seed))
        .layer(CorsLayer::permissive())
        .with_state(AppState { engine })
}

/// The lifeform HTTP server.
pub struct GatewayServer {
    engine: Arc<MetabolismEngine>,
    host: String,
    port: u16,
}

impl GatewayServer {
    pub fn new(engine: Arc<MetabolismEngine>, host: &str, port: u16) -> Self {
        Self {
            engine,
            host: host.to_string(),
            port,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Bind and serve until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Gateway failed to bind {}", addr))?;
        tracing::info!("Gateway listening on {}", addr);

        axum::serve(listener, app_router(self.engine))
            .with_graceful_shutdown(shutdown)
            .await
            .context("Gateway server error")
    }
}

// ============================================================================
// Route handlers
// ============================================================================

async fn health() -> &'static str {
    "ok"
}

async fn read_state(State(state): State<AppState>) -> Result<Json<StateSnapshot>, ApiError> {
    Ok(Json(state.engine.read_state().await?))
}

/// POST /api/reply with `{"question_id": <int>, "text": <non-empty string>}`.
///
/// The body is parsed leniently (no content-type requirement).
async fn submit_reply(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<StateSnapshot>, ApiError> {
    let request = ReplyRequest::parse(&body)?;
    let snapshot = state
        .engine
        .ingest_reply(request.question_id, &request.text)
        .await?;
    Ok(Json(snapshot))
}

async fn seed(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<StateSnapshot>), ApiError> {
    let snapshot = state.engine.force_new_question().await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}
