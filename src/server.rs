//! HTTP chat server.
//!
//! Exposes the [`Retriever`] over a small JSON API. Every query runs on the
//! blocking pool under the configured timeout.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat` | `{"message": "..."}` → best-matching excerpt |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! `POST /chat` always answers `200` with a `response` string for the
//! non-error outcomes (blank message, empty knowledge base, no relevant
//! match, match), together with the structured [`Answer`] fields:
//!
//! ```json
//! { "response": "[manual_part3.txt] ...", "status": "match",
//!   "id": "manual_part3.txt", "score": 0.42, "excerpt": "..." }
//! ```
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "timeout", "message": "query timed out after 30s" } }
//! ```
//!
//! Error codes: `bad_request` (400), `timeout` (408), `corpus_too_large` (413),
//! `store_error` (500), `internal` (500).

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::Config;
use crate::error::QueryError;
use crate::retriever::{Answer, Retriever};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    retriever: Arc<Retriever>,
}

/// Build the router. Exposed separately from [`run_server`] so it can be
/// driven in-process.
pub fn router(retriever: Arc<Retriever>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { retriever })
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config, retriever: Arc<Retriever>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(retriever);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "chat server listening");
    axum::serve(listener, app).await?;

    Ok(())
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
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        let (status, code) = match &err {
            QueryError::CorpusTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "corpus_too_large"),
            QueryError::Timeout(_) => (StatusCode::REQUEST_TIMEOUT, "timeout"),
            QueryError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
            QueryError::Worker(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: String,
}

#[derive(Serialize)]
struct ChatResponse {
    /// The answer rendered for display.
    response: String,
    #[serde(flatten)]
    answer: Answer,
}

async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(request) = payload.map_err(|rejection| AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: rejection.body_text(),
    })?;

    let answer = state
        .retriever
        .answer_with_timeout(request.message.trim().to_string())
        .await
        .map_err(|e| {
            error!(error = %e, "chat query failed");
            AppError::from(e)
        })?;

    Ok(Json(ChatResponse {
        response: answer.to_string(),
        answer,
    }))
}
